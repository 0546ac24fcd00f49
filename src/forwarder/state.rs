use alloc::vec::Vec;

use tracing::{debug, warn};

use crate::{
    clock::Timestamp,
    dead_nonce::DeadNonceList,
    face::{FaceEndpoint, FaceError, FaceInfo, FaceToken, Faces, LinkType},
    forwarder::ForwarderCounters,
    packet::{Data, Interest, Nack, NackHeader},
    region::NetworkRegionTable,
    scheduler::{Scheduler, TimerQueue},
    strategy::is_localhost,
    tables::{
        pit::{PitEntry, PitToken},
        NextHop, Tables,
    },
};

/// Everything the forwarder owns apart from its strategies.
///
/// Strategies get a mutable reference to it in every hook and answer through
/// the outgoing pipelines below (`send_interest`, `send_data`, `send_nack`, ...).
pub struct ForwarderState {
    pub(crate) faces: Faces,
    pub(crate) tables: Tables,
    pub(crate) dead_nonce_list: DeadNonceList,
    pub(crate) timers: TimerQueue,
    pub(crate) counters: ForwarderCounters,
    pub(crate) regions: NetworkRegionTable,
    // Read from the clock once per pipeline run
    pub(crate) now: Timestamp,
    pub(crate) disconnected_faces: Vec<FaceToken>,
}

impl ForwarderState {
    pub(crate) fn new(tables: Tables, dead_nonce_list: DeadNonceList, regions: NetworkRegionTable) -> Self {
        Self {
            faces: Faces::new(),
            tables,
            dead_nonce_list,
            timers: TimerQueue::new(),
            counters: ForwarderCounters::default(),
            regions,
            now: Timestamp::ZERO,
            disconnected_faces: Vec::new(),
        }
    }

    pub fn now(&self) -> Timestamp {
        self.now
    }

    pub fn counters(&self) -> &ForwarderCounters {
        &self.counters
    }

    pub fn tables(&self) -> &Tables {
        &self.tables
    }

    pub fn dead_nonce_list(&self) -> &DeadNonceList {
        &self.dead_nonce_list
    }

    pub fn face_info(&self, face: FaceToken) -> Option<FaceInfo> {
        self.faces.info(face)
    }

    // Panics on a token whose entry was finalized
    pub fn pit_entry(&self, entry: PitToken) -> &PitEntry {
        &self.tables.pit()[entry]
    }

    pub fn pit_entry_mut(&mut self, entry: PitToken) -> &mut PitEntry {
        &mut self.tables.pit_mut()[entry]
    }

    /// Next hops for the entry's Interest.
    ///
    /// Outside the producer region the forwarding hint takes precedence: the
    /// first delegation with any next hop wins.
    pub fn lookup_fib(&self, entry: PitToken) -> Vec<NextHop> {
        let interest = self.pit_entry(entry).interest();
        if !interest.forwarding_hint.is_empty()
            && !self.regions.is_in_producer_region(&interest.forwarding_hint)
        {
            for delegation in interest.forwarding_hint.iter() {
                let next_hops = self.tables.fib_lookup(delegation);
                if !next_hops.is_empty() {
                    return next_hops.to_vec();
                }
            }
        }
        self.tables.fib_lookup(&interest.name).to_vec()
    }

    // Outgoing Interest pipeline
    pub fn send_interest(&mut self, entry: PitToken, egress: FaceEndpoint, mut interest: Interest) {
        if !egress.face.is_valid() || !self.faces.contains(egress.face) {
            warn!(
                "onOutgoingInterest out=(invalid) interest={}",
                interest.name
            );
            return;
        }
        debug!(
            "onOutgoingInterest out={} interest={}",
            egress.face,
            self.pit_entry(entry).name()
        );

        let now = self.now;
        self.tables.pit_mut()[entry].insert_or_update_out_record(
            egress.face,
            egress.endpoint,
            &interest,
            now,
        );

        // Tags are local to this forwarder
        interest.incoming_face = None;
        interest.next_hop_face = None;
        let result = match self.faces.sender_mut(egress.face) {
            Some(sender) => sender.send_interest(&interest, egress.endpoint),
            None => Ok(()),
        };
        self.note_send_result(egress.face, result);
        self.counters.n_out_interests += 1;
    }

    // Sending Data downstream consumes the downstream's in-record
    pub fn send_data(&mut self, entry: PitToken, egress: FaceEndpoint, data: &Data) {
        self.tables.pit_mut()[entry].delete_in_record(egress.face);
        self.on_outgoing_data(data, egress);
    }

    // Every downstream with a live in-record, but the ingress face only if it is ad-hoc
    pub fn send_data_to_all(&mut self, entry: PitToken, ingress: FaceEndpoint, data: &Data) {
        let now = self.now;
        let ingress_is_ad_hoc = matches!(
            self.faces.info(ingress.face),
            Some(info) if info.link_type == LinkType::AdHoc
        );

        let mut downstreams: Vec<FaceEndpoint> = self
            .pit_entry(entry)
            .in_records()
            .iter()
            .filter(|r| r.expiry > now)
            .filter(|r| r.face != ingress.face || ingress_is_ad_hoc)
            .map(|r| FaceEndpoint::new(r.face, r.endpoint))
            .collect();
        downstreams.sort();
        downstreams.dedup();

        for downstream in downstreams {
            self.send_data(entry, downstream, data);
        }
    }

    // Outgoing Nack pipeline
    pub fn send_nack(&mut self, entry: PitToken, egress: FaceEndpoint, header: NackHeader) {
        let name = self.pit_entry(entry).name();
        let Some(info) = self.faces.info(egress.face).filter(|_| egress.face.is_valid()) else {
            warn!(
                "onOutgoingNack out=(invalid) nack={}~{}",
                name, header.reason
            );
            return;
        };

        let Some(in_record) = self.pit_entry(entry).in_record(egress.face) else {
            debug!(
                "onOutgoingNack out={} nack={}~{} no-in-record",
                egress.face, name, header.reason
            );
            return;
        };

        if !info.is_point_to_point() {
            debug!(
                "onOutgoingNack out={} nack={}~{} link-type={:?}",
                egress.face, name, header.reason, info.link_type
            );
            return;
        }

        debug!(
            "onOutgoingNack out={} nack={}~{} OK",
            egress.face, name, header.reason
        );

        let mut nack = Nack::new(in_record.interest.clone(), header.reason);
        nack.header = header;
        nack.interest.incoming_face = None;
        nack.interest.next_hop_face = None;

        self.tables.pit_mut()[entry].delete_in_record(egress.face);

        let result = match self.faces.sender_mut(egress.face) {
            Some(sender) => sender.send_nack(&nack, egress.endpoint),
            None => Ok(()),
        };
        self.note_send_result(egress.face, result);
        self.counters.n_out_nacks += 1;
    }

    // Nacks every downstream except the listed ones
    pub fn send_nacks(&mut self, entry: PitToken, header: NackHeader, except: &[FaceEndpoint]) {
        let downstreams: Vec<FaceEndpoint> = self
            .pit_entry(entry)
            .in_records()
            .iter()
            .map(|r| FaceEndpoint::new(r.face, r.endpoint))
            .filter(|d| !except.contains(d))
            .collect();

        for downstream in downstreams {
            self.send_nack(entry, downstream, header);
        }
    }

    // The entry is finalized (unsatisfied unless Data arrived) on the next timer run
    pub fn reject_pending_interest(&mut self, entry: PitToken) {
        self.set_expiry_timer(entry, 0);
    }

    // Outgoing Data pipeline
    pub(crate) fn on_outgoing_data(&mut self, data: &Data, egress: FaceEndpoint) {
        let Some(info) = self.faces.info(egress.face).filter(|_| egress.face.is_valid()) else {
            warn!("onOutgoingData out=(invalid) data={}", data.name);
            return;
        };

        if !info.is_local() && is_localhost(&data.name) {
            debug!(
                "onOutgoingData out={} data={} violates /localhost",
                egress.face, data.name
            );
            return;
        }

        debug!("onOutgoingData out={} data={}", egress.face, data.name);
        let result = match self.faces.sender_mut(egress.face) {
            Some(sender) => sender.send_data(data, egress.endpoint),
            None => Ok(()),
        };
        self.note_send_result(egress.face, result);
        self.counters.n_out_data += 1;
    }

    // Cancel-then-set; nothing can run in between
    pub(crate) fn set_expiry_timer(&mut self, entry: PitToken, duration_ms: u64) {
        let pit_entry = &mut self.tables.pit_mut()[entry];
        if let Some(timer) = pit_entry.expiry_timer.take() {
            self.timers.cancel(timer);
        }
        let at = self.now.adding(duration_ms);
        pit_entry.expiry_timer = Some(self.timers.schedule(at, entry));
    }

    /// Remembers the nonces of a resolved entry.
    ///
    /// Satisfied entries are only recorded if they asked for fresh Data and the
    /// Data goes stale before a dead nonce would expire. `upstream` limits the
    /// insertion to the out-record of that face.
    pub(crate) fn insert_dead_nonce_list(&mut self, entry: PitToken, upstream: Option<FaceToken>) {
        let now = self.now;
        let pit_entry = &self.tables.pit()[entry];

        let needs_insert = !pit_entry.is_satisfied
            || (pit_entry.interest().must_be_fresh
                && pit_entry.data_freshness_period < self.dead_nonce_list.lifetime());
        if !needs_insert {
            return;
        }

        match upstream {
            None => {
                for record in pit_entry.out_records() {
                    self.dead_nonce_list
                        .add(pit_entry.name(), record.last_nonce, now);
                }
            }
            Some(face) => {
                if let Some(record) = pit_entry.out_record(face) {
                    self.dead_nonce_list
                        .add(pit_entry.name(), record.last_nonce, now);
                }
            }
        }
    }

    fn note_send_result(&mut self, face: FaceToken, result: Result<(), FaceError>) {
        if let Err(FaceError::Disconnected) = result {
            debug!("face={} disconnected", face);
            if !self.disconnected_faces.contains(&face) {
                self.disconnected_faces.push(face);
            }
        }
    }
}
