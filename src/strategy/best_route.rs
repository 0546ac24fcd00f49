use alloc::vec::Vec;

use tracing::debug;

use crate::{
    face::{EndpointId, FaceEndpoint, FaceInfo},
    forwarder::ForwarderState,
    packet::{Interest, Nack},
    strategy::{
        is_next_hop_eligible, propagate_nack_if_all_nacked, reject_with_no_route,
        RetransmissionDecision, RetransmissionSuppression, Strategy,
    },
    tables::{pit::PitToken, NextHop},
};

/// Forwards a new Interest to the cheapest eligible next hop only.
///
/// A retransmission (same Interest, new nonce) that is not suppressed goes to
/// an eligible next hop not tried yet, or else to the one tried longest ago.
#[derive(Default)]
pub struct BestRouteStrategy {
    suppression: RetransmissionSuppression,
}

impl BestRouteStrategy {
    pub fn new(suppression: RetransmissionSuppression) -> Self {
        Self { suppression }
    }

    fn eligible_next_hops(
        fw: &ForwarderState,
        ingress: &FaceInfo,
        interest: &Interest,
        entry: PitToken,
    ) -> Vec<(NextHop, FaceInfo)> {
        fw.lookup_fib(entry)
            .into_iter()
            .filter_map(|hop| Some((hop, fw.face_info(hop.face)?)))
            .filter(|(_, egress)| is_next_hop_eligible(ingress, interest, egress))
            .collect()
    }
}

impl Strategy for BestRouteStrategy {
    fn name(&self) -> &'static str {
        "best-route"
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
        let eligible = Self::eligible_next_hops(fw, &ingress_info, interest, entry);

        let chosen = match decision {
            RetransmissionDecision::New => eligible.first().map(|x| x.0),
            _ => {
                // Prefer a next hop not tried yet, then the one tried longest ago
                let pit_entry = fw.pit_entry(entry);
                eligible
                    .iter()
                    .find(|(hop, _)| pit_entry.out_record(hop.face).is_none())
                    .or_else(|| {
                        eligible.iter().min_by_key(|(hop, _)| {
                            pit_entry.out_record(hop.face).map(|r| r.last_renewed)
                        })
                    })
                    .map(|x| x.0)
            }
        };

        let Some(next_hop) = chosen else {
            if decision == RetransmissionDecision::New {
                reject_with_no_route(fw, ingress, entry);
            } else {
                debug!(
                    "afterReceiveInterest in={} interest={} retransmission with no eligible next hop",
                    ingress.face, interest.name
                );
            }
            return;
        };

        debug!(
            "afterReceiveInterest in={} interest={} to={} retransmission={}",
            ingress.face,
            interest.name,
            next_hop.face,
            decision != RetransmissionDecision::New
        );
        self.suppression
            .record_forwarded(fw.pit_entry_mut(entry), decision, now);
        fw.send_interest(
            entry,
            FaceEndpoint::new(next_hop.face, EndpointId::DEFAULT),
            interest.clone(),
        );
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
}
