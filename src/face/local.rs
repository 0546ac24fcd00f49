use alloc::{collections::VecDeque, rc::Rc};
use core::cell::RefCell;

use crate::{
    face::{EndpointId, FaceError, FaceSender},
    packet::{Data, Interest, Nack, Packet},
};

// An in-process face: whatever the forwarder sends comes out of the receiver
//  half in order. Used by applications living in the same process and by tests.

type Queue = Rc<RefCell<VecDeque<(Packet, EndpointId)>>>;

pub struct LocalSender {
    inner: Queue,
}

pub struct LocalReceiver {
    inner: Queue,
}

pub fn local_face() -> (LocalSender, LocalReceiver) {
    let inner = Rc::new(RefCell::new(VecDeque::new()));

    let sender = LocalSender {
        inner: Rc::clone(&inner),
    };
    let receiver = LocalReceiver { inner };

    (sender, receiver)
}

impl LocalSender {
    fn push(&mut self, packet: Packet, endpoint: EndpointId) -> Result<(), FaceError> {
        if Rc::strong_count(&self.inner) <= 1 {
            return Err(FaceError::Disconnected);
        }

        self.inner.borrow_mut().push_back((packet, endpoint));
        Ok(())
    }
}

impl FaceSender for LocalSender {
    fn send_interest(
        &mut self,
        interest: &Interest,
        endpoint: EndpointId,
    ) -> Result<(), FaceError> {
        self.push(Packet::Interest(interest.clone()), endpoint)
    }

    fn send_data(&mut self, data: &Data, endpoint: EndpointId) -> Result<(), FaceError> {
        self.push(Packet::Data(data.clone()), endpoint)
    }

    fn send_nack(&mut self, nack: &Nack, endpoint: EndpointId) -> Result<(), FaceError> {
        self.push(Packet::Nack(nack.clone()), endpoint)
    }
}

impl LocalReceiver {
    pub fn try_recv(&mut self) -> Result<Option<(Packet, EndpointId)>, FaceError> {
        let packet = self.inner.borrow_mut().pop_front();

        // We only report the disconnect after draining the queued packets
        if packet.is_none() && Rc::strong_count(&self.inner) <= 1 {
            return Err(FaceError::Disconnected);
        }

        Ok(packet)
    }

    pub fn len(&self) -> usize {
        self.inner.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.borrow().is_empty()
    }

    // Everything queued so far, oldest first
    pub fn drain(&mut self) -> impl Iterator<Item = (Packet, EndpointId)> {
        let drained: VecDeque<_> = self.inner.borrow_mut().drain(..).collect();
        drained.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{name::Name, packet::Nonce};

    #[test]
    fn test_local() {
        let (mut sender, mut receiver) = local_face();
        assert!(matches!(receiver.try_recv(), Ok(None)));

        let interest = Interest::new(Name::new(), false, Nonce::from(7));
        assert_eq!(sender.send_interest(&interest, EndpointId(3)), Ok(()));
        let data = Data::new(Name::new(), b"x");
        assert_eq!(sender.send_data(&data, EndpointId::DEFAULT), Ok(()));
        assert_eq!(receiver.len(), 2);

        match receiver.try_recv() {
            Ok(Some((Packet::Interest(i), EndpointId(3)))) => assert_eq!(i.nonce, Nonce::from(7)),
            _ => panic!("expected the interest first"),
        }

        // Dropping the sender is only reported once the queue is drained
        drop(sender);
        assert!(matches!(receiver.try_recv(), Ok(Some((Packet::Data(_), _)))));
        assert_eq!(receiver.try_recv().err(), Some(FaceError::Disconnected));
    }

    #[test]
    fn test_send_after_receiver_dropped() {
        let (mut sender, receiver) = local_face();
        drop(receiver);
        let data = Data::new(Name::new(), b"x");
        assert_eq!(
            sender.send_data(&data, EndpointId::DEFAULT),
            Err(FaceError::Disconnected)
        );
    }
}
