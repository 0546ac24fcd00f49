mod counters;
mod state;


pub use counters::ForwarderCounters;
pub use state::ForwarderState;

use alloc::{boxed::Box, vec::Vec};

use tracing::{debug, warn};

use crate::{
    clock::{Clock, Timestamp},
    config::ForwarderConfig,
    dead_nonce::DeadNonceList,
    face::{EndpointId, FaceEndpoint, FaceInfo, FaceScope, FaceSender, FaceToken, LinkType},
    hash::{Hasher, Sha256Digest},
    name::Name,
    packet::{Data, Interest, Nack, NackReason, Packet},
    region::NetworkRegionTable,
    scheduler::Scheduler,
    store::ContentStore,
    strategy::{is_localhost, BestRouteStrategy, MulticastStrategy, Strategy, StrategyId},
    tables::{
        pit::{PitEntry, PitToken},
        NextHop, Tables,
    },
    unsolicited::{UnsolicitedDataDecision, UnsolicitedDataPolicy},
};

/// Hooks for observing the forwarder without taking part in forwarding.
pub trait ForwarderMetrics {
    fn after_cs_hit(&mut self, _interest: &Interest, _data: &Data) {}

    fn after_cs_miss(&mut self, _interest: &Interest) {}

    fn before_satisfy_interest(&mut self, _entry: &PitEntry, _ingress: FaceToken, _data: &Data) {}

    fn before_expire_pending_interest(&mut self, _entry: &PitEntry) {}
}

pub struct InertMetrics;

impl ForwarderMetrics for InertMetrics {}

/// The forwarding pipelines of one NDN node.
///
/// Nothing here blocks or spawns: packets are pushed in through the
/// `on_incoming_*` methods, PIT expiry happens in `process_timers`, and all
/// output goes to the `FaceSender` of each face. Every call reads the clock
/// once and runs to completion.
pub struct Forwarder<CS, C, H, M>
where
    CS: ContentStore,
    C: Clock,
    H: Hasher<Digest = Sha256Digest>,
    M: ForwarderMetrics,
{
    state: ForwarderState,
    // Indexed by StrategyId, never shrinks
    strategies: Vec<Box<dyn Strategy>>,
    content_store: CS,
    clock: C,
    hasher: H,
    metrics: M,
    unsolicited_data_policy: UnsolicitedDataPolicy,
}

impl<CS, C, H, M> Forwarder<CS, C, H, M>
where
    CS: ContentStore,
    C: Clock,
    H: Hasher<Digest = Sha256Digest>,
    M: ForwarderMetrics,
{
    pub fn new(content_store: CS, clock: C, hasher: H, metrics: M) -> Self {
        Self::with_config(&ForwarderConfig::default(), content_store, clock, hasher, metrics)
    }

    pub fn with_config(
        config: &ForwarderConfig,
        content_store: CS,
        clock: C,
        hasher: H,
        metrics: M,
    ) -> Self {
        let strategies: Vec<Box<dyn Strategy>> = alloc::vec![
            Box::new(BestRouteStrategy::default()),
            Box::new(MulticastStrategy::default()),
        ];
        let regions: NetworkRegionTable = config.network_regions.iter().cloned().collect();
        let state = ForwarderState::new(
            Tables::new(StrategyId::BEST_ROUTE),
            DeadNonceList::new(config.dead_nonce_lifetime_ms),
            regions,
        );

        Self {
            state,
            strategies,
            content_store,
            clock,
            hasher,
            metrics,
            unsolicited_data_policy: config.unsolicited_data_policy,
        }
    }

    pub fn state(&self) -> &ForwarderState {
        &self.state
    }

    pub fn counters(&self) -> &ForwarderCounters {
        &self.state.counters
    }

    pub fn content_store(&self) -> &CS {
        &self.content_store
    }

    pub fn content_store_mut(&mut self) -> &mut CS {
        &mut self.content_store
    }

    pub fn metrics(&self) -> &M {
        &self.metrics
    }

    pub fn dead_nonce_list(&self) -> &DeadNonceList {
        &self.state.dead_nonce_list
    }

    pub fn network_regions_mut(&mut self) -> &mut NetworkRegionTable {
        &mut self.state.regions
    }

    pub fn set_unsolicited_data_policy(&mut self, policy: UnsolicitedDataPolicy) {
        self.unsolicited_data_policy = policy;
    }

    pub fn add_face<FS>(
        &mut self,
        sender: FS,
        scope: FaceScope,
        link_type: LinkType,
    ) -> Option<FaceToken>
    where
        FS: FaceSender + 'static,
    {
        let token = self.state.faces.add_face(sender, scope, link_type)?;
        debug!("addFace face={} scope={:?} link-type={:?}", token, scope, link_type);
        Some(token)
    }

    /// Forgets a face together with its next hops and PIT records.
    ///
    /// PIT entries left without any record are finalized on the next timer run.
    pub fn remove_face(&mut self, face: FaceToken) -> bool {
        self.tick();
        if !self.state.faces.remove_face(face) {
            return false;
        }
        debug!("removeFace face={}", face);

        self.state.tables.fib_remove_face(face);
        let tokens: Vec<PitToken> = self.state.tables.pit().tokens().collect();
        for token in tokens {
            let entry = self.state.pit_entry_mut(token);
            if entry.remove_face(face) && !entry.has_records() {
                self.state.set_expiry_timer(token, 0);
            }
        }
        self.state.disconnected_faces.retain(|f| *f != face);
        true
    }

    // Faces whose sender reported a disconnect since the last call
    pub fn take_disconnected_faces(&mut self) -> Vec<FaceToken> {
        core::mem::take(&mut self.state.disconnected_faces)
    }

    /// Adds (or updates the cost of) a next hop.
    ///
    /// A next hop that is new to the prefix is offered to the pending Interests
    /// under it whose strategy asks for it.
    pub fn register_prefix(&mut self, prefix: &Name, face: FaceToken, cost: u32) -> bool {
        if !self.state.faces.contains(face) {
            warn!("registerPrefix prefix={} face={} unknown face", prefix, face);
            return false;
        }
        self.tick();
        let is_new = self.state.tables.fib_add_next_hop(prefix, face, cost);
        debug!("registerPrefix prefix={} face={} cost={} new={}", prefix, face, cost, is_new);
        if is_new {
            self.on_new_next_hop(prefix, NextHop { cost, face });
        }
        true
    }

    pub fn unregister_prefix(&mut self, prefix: &Name, face: FaceToken) -> bool {
        debug!("unregisterPrefix prefix={} face={}", prefix, face);
        self.state.tables.fib_remove_next_hop(prefix, face)
    }

    pub fn register_strategy(&mut self, strategy: Box<dyn Strategy>) -> StrategyId {
        let id = StrategyId(self.strategies.len());
        debug!("registerStrategy name={} id={}", strategy.name(), id.0);
        self.strategies.push(strategy);
        id
    }

    pub fn find_strategy(&self, name: &str) -> Option<StrategyId> {
        self.strategies
            .iter()
            .position(|s| s.name() == name)
            .map(StrategyId)
    }

    pub fn set_strategy(&mut self, prefix: &Name, strategy: StrategyId) -> bool {
        let Some(instance) = self.strategies.get(strategy.0) else {
            warn!("setStrategy prefix={} unknown strategy id={}", prefix, strategy.0);
            return false;
        };
        debug!("setStrategy prefix={} strategy={}", prefix, instance.name());
        self.state.tables.set_strategy(prefix, strategy);
        true
    }

    // The root keeps its strategy
    pub fn unset_strategy(&mut self, prefix: &Name) -> bool {
        self.state.tables.unset_strategy(prefix)
    }

    pub fn on_incoming_packet(&mut self, ingress: FaceEndpoint, packet: Packet) {
        match packet {
            Packet::Interest(interest) => self.on_incoming_interest(ingress, interest),
            Packet::Data(data) => self.on_incoming_data(ingress, data),
            Packet::Nack(nack) => self.on_incoming_nack(ingress, nack),
        }
    }

    // Incoming Interest pipeline
    pub fn on_incoming_interest(&mut self, ingress: FaceEndpoint, mut interest: Interest) {
        self.tick();
        let Some(info) = self.state.faces.info(ingress.face) else {
            warn!(
                "onIncomingInterest in={} interest={} unknown face",
                ingress.face, interest.name
            );
            return;
        };
        debug!(
            "onIncomingInterest in={} interest={}",
            ingress.face, interest.name
        );
        interest.incoming_face = Some(ingress.face);
        self.state.counters.n_in_interests += 1;

        if !info.is_local() && is_localhost(&interest.name) {
            debug!(
                "onIncomingInterest in={} interest={} violates /localhost",
                ingress.face, interest.name
            );
            return;
        }

        let now = self.state.now;
        if self
            .state
            .dead_nonce_list
            .has(&interest.name, interest.nonce, now)
        {
            self.on_interest_loop(ingress, &info, &interest);
            return;
        }

        if !interest.forwarding_hint.is_empty()
            && self
                .state
                .regions
                .is_in_producer_region(&interest.forwarding_hint)
        {
            debug!(
                "onIncomingInterest in={} interest={} reaching-producer-region",
                ingress.face, interest.name
            );
            interest.forwarding_hint.clear();
        }

        let (entry, _) = self.state.tables.pit_find_or_insert(&interest);

        let duplicate = self
            .state
            .pit_entry(entry)
            .find_nonce(interest.nonce, ingress.face);
        // A point-to-point face may legitimately repeat its own nonce
        let is_loop = !duplicate.is_none() && !(info.is_point_to_point() && duplicate.in_same);
        if is_loop {
            self.on_interest_loop(ingress, &info, &interest);
            self.dispatch(entry, |strategy, fw| {
                strategy.after_receive_looped_interest(fw, &interest, ingress, entry)
            });
            return;
        }

        if self.state.pit_entry(entry).has_in_records() {
            self.on_content_store_miss(ingress, entry, &interest);
            return;
        }

        match self.content_store.find(&interest, now) {
            Some(data) => self.on_content_store_hit(ingress, entry, &interest, data),
            None => self.on_content_store_miss(ingress, entry, &interest),
        }
    }

    fn on_interest_loop(&mut self, ingress: FaceEndpoint, info: &FaceInfo, interest: &Interest) {
        if !info.is_point_to_point() {
            debug!(
                "onInterestLoop in={} interest={} drop",
                ingress.face, interest.name
            );
            return;
        }

        debug!(
            "onInterestLoop in={} interest={} send-Nack-duplicate",
            ingress.face, interest.name
        );
        let mut looped = interest.clone();
        looped.incoming_face = None;
        looped.next_hop_face = None;
        let nack = Nack::new(looped, NackReason::Duplicate);
        if let Some(sender) = self.state.faces.sender_mut(ingress.face) {
            if sender.send_nack(&nack, ingress.endpoint).is_err() {
                debug!("face={} disconnected", ingress.face);
                if !self.state.disconnected_faces.contains(&ingress.face) {
                    self.state.disconnected_faces.push(ingress.face);
                }
            }
        }
    }

    fn on_content_store_miss(&mut self, ingress: FaceEndpoint, entry: PitToken, interest: &Interest) {
        debug!(
            "onContentStoreMiss interest={}",
            interest.name
        );
        self.state.counters.n_cs_misses += 1;
        self.metrics.after_cs_miss(interest);

        let now = self.state.now;
        let pit_entry = self.state.pit_entry_mut(entry);
        pit_entry.insert_or_update_in_record(ingress.face, ingress.endpoint, interest, now);
        let remaining = pit_entry
            .max_in_record_expiry()
            .and_then(|expiry| expiry.difference(&now))
            .unwrap_or(0);
        self.state.set_expiry_timer(entry, remaining);

        if let Some(next_hop) = interest.next_hop_face {
            if self.state.faces.contains(next_hop) {
                debug!(
                    "onContentStoreMiss interest={} nexthop-faceid={}",
                    interest.name, next_hop
                );
                self.state.send_interest(
                    entry,
                    FaceEndpoint::new(next_hop, EndpointId::DEFAULT),
                    interest.clone(),
                );
            } else {
                debug!(
                    "onContentStoreMiss interest={} nexthop-faceid={} not found",
                    interest.name, next_hop
                );
            }
            return;
        }

        self.dispatch(entry, |strategy, fw| {
            strategy.after_receive_interest(fw, interest, ingress, entry)
        });
    }

    fn on_content_store_hit(
        &mut self,
        ingress: FaceEndpoint,
        entry: PitToken,
        interest: &Interest,
        mut data: Data,
    ) {
        debug!(
            "onContentStoreHit interest={}",
            interest.name
        );
        self.state.counters.n_cs_hits += 1;
        self.metrics.after_cs_hit(interest, &data);

        data.incoming_face = Some(FaceToken::CONTENT_STORE);
        let pit_entry = self.state.pit_entry_mut(entry);
        pit_entry.is_satisfied = true;
        pit_entry.data_freshness_period = data.freshness_period;
        self.state.set_expiry_timer(entry, 0);

        self.metrics.before_satisfy_interest(
            self.state.pit_entry(entry),
            FaceToken::CONTENT_STORE,
            &data,
        );
        let content_store = FaceEndpoint::new(FaceToken::CONTENT_STORE, EndpointId::DEFAULT);
        self.dispatch(entry, |strategy, fw| {
            strategy.before_satisfy_interest(fw, &data, content_store, entry);
            strategy.after_content_store_hit(fw, &data, ingress, entry);
        });
    }

    // Incoming Data pipeline
    pub fn on_incoming_data(&mut self, ingress: FaceEndpoint, mut data: Data) {
        self.tick();
        let Some(info) = self.state.faces.info(ingress.face) else {
            warn!(
                "onIncomingData in={} data={} unknown face",
                ingress.face, data.name
            );
            return;
        };
        debug!("onIncomingData in={} data={}", ingress.face, data.name);
        data.incoming_face = Some(ingress.face);
        self.state.counters.n_in_data += 1;

        if !info.is_local() && is_localhost(&data.name) {
            debug!(
                "onIncomingData in={} data={} violates /localhost",
                ingress.face, data.name
            );
            return;
        }

        // The digest is only needed for full-name Interests and the CS, compute it at most once
        let mut digest_cache: Option<[u8; 32]> = None;
        let matches = {
            let hasher = &mut self.hasher;
            let data = &data;
            let mut digest =
                || *digest_cache.get_or_insert_with(|| data.implicit_digest(&mut *hasher));
            self.state.tables.pit_find_all_data_matches(data, &mut digest)
        };

        if matches.is_empty() {
            self.on_data_unsolicited(ingress, &info, &data, digest_cache);
            return;
        }

        let now = self.state.now;
        let digest = match digest_cache {
            Some(digest) => digest,
            None => data.implicit_digest(&mut self.hasher),
        };
        self.content_store.insert(&data, digest, false, now);

        if matches.len() == 1 {
            let entry = matches[0];
            debug!(
                "onIncomingData in={} data={} matching={}",
                ingress.face,
                data.name,
                self.state.pit_entry(entry).name()
            );
            self.state.set_expiry_timer(entry, 0);
            self.metrics
                .before_satisfy_interest(self.state.pit_entry(entry), ingress.face, &data);
            self.dispatch(entry, |strategy, fw| {
                strategy.before_satisfy_interest(fw, &data, ingress, entry);
                strategy.after_receive_data(fw, &data, ingress, entry);
            });

            let pit_entry = self.state.pit_entry_mut(entry);
            pit_entry.is_satisfied = true;
            pit_entry.data_freshness_period = data.freshness_period;
            self.state.insert_dead_nonce_list(entry, Some(ingress.face));
            self.state.pit_entry_mut(entry).delete_out_record(ingress.face);
            return;
        }

        let mut downstreams: Vec<FaceEndpoint> = Vec::new();
        for &entry in matches.iter() {
            debug!(
                "onIncomingData in={} data={} matching={}",
                ingress.face,
                data.name,
                self.state.pit_entry(entry).name()
            );
            downstreams.extend(
                self.state
                    .pit_entry(entry)
                    .in_records()
                    .iter()
                    .filter(|r| r.expiry > now)
                    .map(|r| FaceEndpoint::new(r.face, r.endpoint)),
            );

            self.state.set_expiry_timer(entry, 0);
            self.metrics
                .before_satisfy_interest(self.state.pit_entry(entry), ingress.face, &data);
            self.dispatch(entry, |strategy, fw| {
                strategy.before_satisfy_interest(fw, &data, ingress, entry)
            });

            let pit_entry = self.state.pit_entry_mut(entry);
            pit_entry.is_satisfied = true;
            pit_entry.data_freshness_period = data.freshness_period;
            self.state.insert_dead_nonce_list(entry, Some(ingress.face));

            let pit_entry = self.state.pit_entry_mut(entry);
            pit_entry.clear_in_records();
            pit_entry.delete_out_record(ingress.face);
        }
        downstreams.sort();
        downstreams.dedup();

        for downstream in downstreams {
            if downstream.face == ingress.face && info.link_type != LinkType::AdHoc {
                continue;
            }
            self.state.on_outgoing_data(&data, downstream);
        }
    }

    fn on_data_unsolicited(
        &mut self,
        ingress: FaceEndpoint,
        info: &FaceInfo,
        data: &Data,
        digest: Option<[u8; 32]>,
    ) {
        self.state.counters.n_unsolicited_data += 1;
        let decision = self.unsolicited_data_policy.decide(info, data);
        debug!(
            "onDataUnsolicited in={} data={} decision={}",
            ingress.face, data.name, decision
        );
        if decision == UnsolicitedDataDecision::Cache {
            let digest = match digest {
                Some(digest) => digest,
                None => data.implicit_digest(&mut self.hasher),
            };
            self.content_store
                .insert(data, digest, true, self.state.now);
        }
    }

    // Incoming Nack pipeline
    pub fn on_incoming_nack(&mut self, ingress: FaceEndpoint, mut nack: Nack) {
        self.tick();
        let Some(info) = self.state.faces.info(ingress.face) else {
            warn!(
                "onIncomingNack in={} nack={}~{} unknown face",
                ingress.face,
                nack.interest.name,
                nack.reason()
            );
            return;
        };
        nack.incoming_face = Some(ingress.face);
        self.state.counters.n_in_nacks += 1;

        if !info.is_point_to_point() {
            debug!(
                "onIncomingNack in={} nack={}~{} link-type={:?}",
                ingress.face,
                nack.interest.name,
                nack.reason(),
                info.link_type
            );
            return;
        }

        let Some(entry) = self.state.tables.pit_find(&nack.interest) else {
            debug!(
                "onIncomingNack in={} nack={}~{} no-PIT-entry",
                ingress.face,
                nack.interest.name,
                nack.reason()
            );
            return;
        };

        let now = self.state.now;
        let pit_entry = self.state.pit_entry_mut(entry);
        let Some(out_record) = pit_entry.out_record_mut(ingress.face) else {
            debug!(
                "onIncomingNack in={} nack={}~{} no-out-record",
                ingress.face,
                nack.interest.name,
                nack.reason()
            );
            return;
        };

        if out_record.last_nonce != nack.interest.nonce {
            debug!(
                "onIncomingNack in={} nack={}~{} nonce-mismatch {}!={}",
                ingress.face,
                nack.interest.name,
                nack.reason(),
                nack.interest.nonce,
                out_record.last_nonce
            );
            return;
        }

        debug!(
            "onIncomingNack in={} nack={}~{} OK",
            ingress.face,
            nack.interest.name,
            nack.reason()
        );
        out_record.incoming_nack = Some(nack.header);

        if !pit_entry.has_pending_out_records(now) {
            self.state.set_expiry_timer(entry, 0);
        }

        self.dispatch(entry, |strategy, fw| {
            strategy.after_receive_nack(fw, &nack, ingress, entry)
        });
    }

    // A face gave up on an Interest after the forwarder sent it
    pub fn on_dropped_interest(&mut self, egress: FaceEndpoint, interest: &Interest) {
        self.tick();
        let strategy = self.state.tables.effective_strategy(&interest.name);
        self.strategies[strategy.0].on_dropped_interest(&mut self.state, interest, egress);
    }

    /// Offers a next hop new to `prefix` to the pending Interests under it.
    ///
    /// The walk stops below any name that has next hops of its own, since
    /// Interests there never used the new one. Only entries whose strategy
    /// asks for the trigger are offered, apart from those at the root.
    fn on_new_next_hop(&mut self, prefix: &Name, next_hop: NextHop) {
        let start_depth = prefix.component_count();
        let strategies = &self.strategies;
        let affected = self.state.tables.partial_enumerate(prefix, |node| {
            if node.depth == 0 {
                return (true, true);
            }
            let wants_trigger = strategies
                .get(node.strategy.0)
                .map(|s| s.wants_new_next_hop_trigger())
                .unwrap_or(false);
            // The registered prefix has the new next hop as its own route
            if node.depth == start_depth {
                return (node.has_pit_entries && wants_trigger, true);
            }
            match (node.has_fib_entry, node.has_pit_entries && wants_trigger) {
                (false, true) => (true, true),
                (false, false) => (false, true),
                (true, _) => (false, false),
            }
        });

        for entry in affected {
            self.dispatch(entry, |strategy, fw| {
                strategy.after_new_next_hop(fw, &next_hop, entry)
            });
        }
    }

    /// Finalizes every PIT entry whose timer is due and returns how many.
    pub fn process_timers(&mut self) -> usize {
        self.tick();
        let now = self.state.now;
        let mut finalized = 0;
        while let Some((timer, entry)) = self.state.timers.pop_due(now) {
            match self.state.tables.pit_mut().get_mut(entry) {
                Some(pit_entry) if pit_entry.expiry_timer == Some(timer) => {
                    pit_entry.expiry_timer = None;
                }
                _ => continue,
            }
            self.on_interest_finalize(entry);
            finalized += 1;
        }
        finalized
    }

    pub fn next_timer_deadline(&self) -> Option<Timestamp> {
        self.state.timers.next_deadline()
    }

    fn on_interest_finalize(&mut self, entry: PitToken) {
        let pit_entry = self.state.pit_entry(entry);
        debug!(
            "onInterestFinalize interest={} {}",
            pit_entry.name(),
            if pit_entry.is_satisfied {
                "satisfied"
            } else {
                "unsatisfied"
            }
        );
        let is_satisfied = pit_entry.is_satisfied;
        if !is_satisfied {
            self.metrics.before_expire_pending_interest(pit_entry);
        }

        self.state.insert_dead_nonce_list(entry, None);

        if is_satisfied {
            self.state.counters.n_satisfied_interests += 1;
        } else {
            self.state.counters.n_unsatisfied_interests += 1;
        }

        if let Some(timer) = self.state.pit_entry_mut(entry).expiry_timer.take() {
            self.state.timers.cancel(timer);
        }
        self.state.tables.pit_erase(entry);
    }

    fn dispatch<F>(&mut self, entry: PitToken, hook: F)
    where
        F: FnOnce(&mut dyn Strategy, &mut ForwarderState),
    {
        let strategy = self
            .state
            .tables
            .effective_strategy(self.state.pit_entry(entry).name());
        hook(self.strategies[strategy.0].as_mut(), &mut self.state);
    }

    fn tick(&mut self) {
        self.state.now = self.clock.now();
    }
}
