use alloc::vec::Vec;

use tracing::debug;

use crate::{
    face::{EndpointId, FaceEndpoint},
    forwarder::ForwarderState,
    packet::{Interest, Nack},
    strategy::{
        is_next_hop_eligible, propagate_nack_if_all_nacked, reject_with_no_route,
        RetransmissionDecision, RetransmissionSuppression, Strategy,
    },
    tables::{pit::PitToken, NextHop},
};

/// Forwards every Interest to all eligible next hops, and offers pending
/// Interests to next hops that show up while they wait.
#[derive(Default)]
pub struct MulticastStrategy {
    suppression: RetransmissionSuppression,
}

impl MulticastStrategy {
    pub fn new(suppression: RetransmissionSuppression) -> Self {
        Self { suppression }
    }
}

impl Strategy for MulticastStrategy {
    fn name(&self) -> &'static str {
        "multicast"
    }

    fn after_receive_interest(
        &mut self,
        fw: &mut ForwarderState,
        interest: &Interest,
        ingress: FaceEndpoint,
        entry: PitToken,
    ) {
        let now = fw.now();
        let decision = self.suppression.decide(fw.pit_entry(entry), now);
        if decision == RetransmissionDecision::Suppress {
            debug!(
                "afterReceiveInterest in={} interest={} suppressed",
                ingress.face, interest.name
            );
            return;
        }

        let Some(ingress_info) = fw.face_info(ingress.face) else {
            return;
        };
        let egresses: Vec<_> = fw
            .lookup_fib(entry)
            .into_iter()
            .filter(|hop| match fw.face_info(hop.face) {
                Some(egress) => is_next_hop_eligible(&ingress_info, interest, &egress),
                None => false,
            })
            .map(|hop| hop.face)
            .collect();

        if egresses.is_empty() {
            if !fw.pit_entry(entry).has_pending_out_records(now) {
                reject_with_no_route(fw, ingress, entry);
            }
            return;
        }

        self.suppression
            .record_forwarded(fw.pit_entry_mut(entry), decision, now);
        for face in egresses {
            debug!(
                "afterReceiveInterest in={} interest={} to={}",
                ingress.face, interest.name, face
            );
            fw.send_interest(
                entry,
                FaceEndpoint::new(face, EndpointId::DEFAULT),
                interest.clone(),
            );
        }
    }

    fn after_receive_nack(
        &mut self,
        fw: &mut ForwarderState,
        nack: &Nack,
        ingress: FaceEndpoint,
        entry: PitToken,
    ) {
        debug!(
            "afterReceiveNack in={} nack={}~{}",
            ingress.face,
            nack.interest.name,
            nack.reason()
        );
        propagate_nack_if_all_nacked(fw, entry);
    }

    fn after_new_next_hop(&mut self, fw: &mut ForwarderState, next_hop: &NextHop, entry: PitToken) {
        let now = fw.now();
        let Some(egress) = fw.face_info(next_hop.face) else {
            return;
        };

        let pit_entry = fw.pit_entry(entry);
        if matches!(pit_entry.out_record(next_hop.face), Some(r) if r.is_pending(now)) {
            return;
        }

        // Any live downstream other than the new next hop can vouch for the Interest
        let downstream = pit_entry
            .in_records()
            .iter()
            .filter(|r| r.face != next_hop.face && r.expiry > now)
            .find_map(|r| {
                let ingress = fw.face_info(r.face)?;
                is_next_hop_eligible(&ingress, &r.interest, &egress).then(|| r.interest.clone())
            });

        let Some(interest) = downstream else {
            return;
        };
        debug!(
            "afterNewNextHop pitEntry={} to={}",
            pit_entry.name(),
            next_hop.face
        );
        fw.send_interest(
            entry,
            FaceEndpoint::new(next_hop.face, EndpointId::DEFAULT),
            interest,
        );
    }

    fn wants_new_next_hop_trigger(&self) -> bool {
        true
    }
}
