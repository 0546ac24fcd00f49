mod best_route;
mod multicast;

pub use best_route::BestRouteStrategy;
pub use multicast::MulticastStrategy;

use tracing::debug;

use crate::{
    clock::Timestamp,
    face::{FaceEndpoint, FaceInfo, LinkType},
    forwarder::ForwarderState,
    name::{Name, NameComponent},
    packet::{Data, Interest, Nack, NackHeader, NackReason},
    tables::{pit::PitEntry, pit::PitToken, NextHop},
};

/// Index of a strategy instance registered with the forwarder.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StrategyId(pub(crate) usize);

impl StrategyId {
    // Registered by every forwarder, in this order
    pub const BEST_ROUTE: StrategyId = StrategyId(0);
    pub const MULTICAST: StrategyId = StrategyId(1);
}

// A Strategy decides where Interests go and how the PIT entry reacts to Data,
//  Nacks and topology changes. The forwarder owns the state and calls these
//  hooks at fixed points of its pipelines; the strategy answers by calling the
//  outgoing pipelines on the `ForwarderState` it is handed.

// Hooks always run for the effective strategy of the PIT entry's name.

pub trait Strategy {
    fn name(&self) -> &'static str;

    fn after_receive_interest(
        &mut self,
        fw: &mut ForwarderState,
        interest: &Interest,
        ingress: FaceEndpoint,
        entry: PitToken,
    );

    fn after_receive_looped_interest(
        &mut self,
        fw: &mut ForwarderState,
        interest: &Interest,
        ingress: FaceEndpoint,
        entry: PitToken,
    ) {
        let _ = (fw, entry);
        debug!(
            "afterReceiveLoopedInterest in={} interest={} nonce={}",
            ingress.face, interest.name, interest.nonce
        );
    }

    fn before_satisfy_interest(
        &mut self,
        fw: &mut ForwarderState,
        data: &Data,
        ingress: FaceEndpoint,
        entry: PitToken,
    ) {
        debug!(
            "beforeSatisfyInterest pitEntry={} in={} data={}",
            fw.pit_entry(entry).name(),
            ingress.face,
            data.name
        );
    }

    fn after_content_store_hit(
        &mut self,
        fw: &mut ForwarderState,
        data: &Data,
        ingress: FaceEndpoint,
        entry: PitToken,
    ) {
        debug!(
            "afterContentStoreHit pitEntry={} in={} data={}",
            fw.pit_entry(entry).name(),
            ingress.face,
            data.name
        );
        fw.send_data(entry, ingress, data);
    }

    fn after_receive_data(
        &mut self,
        fw: &mut ForwarderState,
        data: &Data,
        ingress: FaceEndpoint,
        entry: PitToken,
    ) {
        debug!(
            "afterReceiveData pitEntry={} in={} data={}",
            fw.pit_entry(entry).name(),
            ingress.face,
            data.name
        );
        fw.send_data_to_all(entry, ingress, data);
    }

    fn after_receive_nack(
        &mut self,
        fw: &mut ForwarderState,
        nack: &Nack,
        ingress: FaceEndpoint,
        entry: PitToken,
    ) {
        let _ = (fw, entry);
        debug!(
            "afterReceiveNack in={} nack={}~{}",
            ingress.face,
            nack.interest.name,
            nack.reason()
        );
    }

    fn after_new_next_hop(&mut self, fw: &mut ForwarderState, next_hop: &NextHop, entry: PitToken) {
        debug!(
            "afterNewNextHop pitEntry={} nexthop={}",
            fw.pit_entry(entry).name(),
            next_hop.face
        );
    }

    fn on_dropped_interest(
        &mut self,
        fw: &mut ForwarderState,
        interest: &Interest,
        egress: FaceEndpoint,
    ) {
        let _ = fw;
        debug!(
            "onDroppedInterest out={} interest={}",
            egress.face, interest.name
        );
    }

    // Whether pending Interests should be offered to next hops added later on
    fn wants_new_next_hop_trigger(&self) -> bool {
        false
    }
}

pub(crate) fn is_localhost(name: &Name) -> bool {
    matches!(name.get(0), Some(c) if *c == NameComponent::generic(b"localhost"))
}

fn is_localhop(name: &Name) -> bool {
    matches!(name.get(0), Some(c) if *c == NameComponent::generic(b"localhop"))
}

// /localhost never leaves the host; /localhop goes at most one hop off the host
pub fn would_violate_scope(ingress: &FaceInfo, interest: &Interest, egress: &FaceInfo) -> bool {
    if egress.is_local() {
        return false;
    }
    if is_localhost(&interest.name) {
        return true;
    }
    is_localhop(&interest.name) && !ingress.is_local()
}

// Forwarding back out of the ingress face only makes sense on ad-hoc links
pub fn is_next_hop_eligible(
    ingress: &FaceInfo,
    interest: &Interest,
    egress: &FaceInfo,
) -> bool {
    if egress.token == ingress.token && egress.link_type != LinkType::AdHoc {
        return false;
    }
    !would_violate_scope(ingress, interest, egress)
}

/// Outcome of checking an incoming Interest against the retransmission timer.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RetransmissionDecision {
    // Never forwarded before
    New,
    // A retransmission that may go out
    Forward,
    // A retransmission that came too soon after the previous one
    Suppress,
}

/// Exponential back-off for retransmitted Interests: after each forwarded
/// retransmission the quiet period doubles, up to a limit.
#[derive(Copy, Clone, Debug)]
pub struct RetransmissionSuppression {
    pub min_delay_ms: u64,
    pub max_doublings: u8,
}

pub const MIN_RETRANSMISSION_DELAY_MS: u64 = 8;
pub const MAX_RETRANSMISSION_DELAY_DOUBLINGS: u8 = 5;

impl Default for RetransmissionSuppression {
    fn default() -> Self {
        Self {
            min_delay_ms: MIN_RETRANSMISSION_DELAY_MS,
            max_doublings: MAX_RETRANSMISSION_DELAY_DOUBLINGS,
        }
    }
}

impl RetransmissionSuppression {
    pub fn decide(&self, entry: &PitEntry, now: Timestamp) -> RetransmissionDecision {
        let Some(last_forwarded) = entry.retransmission.last_forwarded else {
            return RetransmissionDecision::New;
        };
        if entry.out_records().is_empty() {
            return RetransmissionDecision::New;
        }

        let doublings = u32::from(entry.retransmission.count.min(self.max_doublings));
        // Saturates once a doubling would drop bits
        let delay = self
            .min_delay_ms
            .checked_shl(doublings)
            .filter(|d| d >> doublings == self.min_delay_ms)
            .unwrap_or(u64::MAX);
        if now < last_forwarded.adding(delay) {
            RetransmissionDecision::Suppress
        } else {
            RetransmissionDecision::Forward
        }
    }

    pub fn record_forwarded(
        &self,
        entry: &mut PitEntry,
        decision: RetransmissionDecision,
        now: Timestamp,
    ) {
        entry.retransmission.last_forwarded = Some(now);
        entry.retransmission.count = match decision {
            RetransmissionDecision::New => 0,
            _ => entry.retransmission.count.saturating_add(1),
        };
    }
}

// Once every upstream has Nacked, pass the least severe reason downstream
pub(crate) fn propagate_nack_if_all_nacked(fw: &mut ForwarderState, entry: PitToken) {
    let now = fw.now();
    let pit_entry = fw.pit_entry(entry);
    if pit_entry.has_pending_out_records(now) {
        debug!(
            "afterReceiveNack pitEntry={} waiting for other upstreams",
            pit_entry.name()
        );
        return;
    }

    let least_severe = pit_entry
        .out_records()
        .iter()
        .filter_map(|r| r.incoming_nack)
        .fold(None::<NackHeader>, |acc, header| match acc {
            Some(best) if !header.reason.is_less_severe(best.reason) => Some(best),
            _ => Some(header),
        });

    let header = least_severe.unwrap_or(NackHeader::new(NackReason::None));
    debug!(
        "afterReceiveNack pitEntry={} all upstreams Nacked, reason={}",
        pit_entry.name(),
        header.reason
    );
    fw.send_nacks(entry, header, &[]);
}

// Every eligible next hop is gone, tell the downstreams and finish the entry
pub(crate) fn reject_with_no_route(fw: &mut ForwarderState, ingress: FaceEndpoint, entry: PitToken) {
    debug!(
        "afterReceiveInterest pitEntry={} no eligible next hop, send Nack NoRoute",
        fw.pit_entry(entry).name()
    );
    fw.send_nack(entry, ingress, NackHeader::new(NackReason::NoRoute));
    fw.reject_pending_interest(entry);
}
