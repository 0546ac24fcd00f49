pub mod local;

use alloc::{boxed::Box, vec::Vec};
use core::fmt;

use crate::packet::{Data, Interest, Nack};

// A Face is the forwarder's view of a link: it knows how far the link reaches
//  (scope), how many peers share it (link type), and how to push packets onto it.

// Faces are owned by the forwarder once added; the token is the only thing
//  the tables and the records ever hold on to.

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FaceToken(pub(crate) u32);

impl FaceToken {
    pub const INVALID: FaceToken = FaceToken(0);
    // Logical source of Data that was served from the content store
    pub const CONTENT_STORE: FaceToken = FaceToken(254);

    pub(crate) const FIRST_DYNAMIC: u32 = 256;

    pub fn id(&self) -> u32 {
        self.0
    }

    pub fn is_valid(&self) -> bool {
        *self != FaceToken::INVALID
    }
}

impl fmt::Display for FaceToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for FaceToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FaceToken({})", self.0)
    }
}

/// Identifies a remote peer behind a multi-access or ad-hoc face.
///
/// Point-to-point faces only ever use [`EndpointId::DEFAULT`].
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EndpointId(pub u64);

impl EndpointId {
    pub const DEFAULT: EndpointId = EndpointId(0);
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FaceEndpoint {
    pub face: FaceToken,
    pub endpoint: EndpointId,
}

impl FaceEndpoint {
    pub fn new(face: FaceToken, endpoint: EndpointId) -> Self {
        Self { face, endpoint }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FaceScope {
    Local,
    NonLocal,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum LinkType {
    PointToPoint,
    MultiAccess,
    AdHoc,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct FaceInfo {
    pub token: FaceToken,
    pub scope: FaceScope,
    pub link_type: LinkType,
}

impl FaceInfo {
    pub fn is_local(&self) -> bool {
        self.scope == FaceScope::Local
    }

    pub fn is_point_to_point(&self) -> bool {
        self.link_type == LinkType::PointToPoint
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum FaceError {
    #[error("face is disconnected")]
    Disconnected,
}

// Sends never block; a face that cannot keep up drops on its own side.
pub trait FaceSender {
    fn send_interest(&mut self, interest: &Interest, endpoint: EndpointId)
        -> Result<(), FaceError>;
    fn send_data(&mut self, data: &Data, endpoint: EndpointId) -> Result<(), FaceError>;
    fn send_nack(&mut self, nack: &Nack, endpoint: EndpointId) -> Result<(), FaceError>;
}

// Swallows everything, used for the content store pseudo-face
struct NullSender;

impl FaceSender for NullSender {
    fn send_interest(&mut self, _: &Interest, _: EndpointId) -> Result<(), FaceError> {
        Ok(())
    }

    fn send_data(&mut self, _: &Data, _: EndpointId) -> Result<(), FaceError> {
        Ok(())
    }

    fn send_nack(&mut self, _: &Nack, _: EndpointId) -> Result<(), FaceError> {
        Ok(())
    }
}

struct FaceEntry {
    info: FaceInfo,
    sender: Box<dyn FaceSender>,
}

pub struct Faces {
    // Sorted by id, reserved ids come before all dynamic ones
    faces: Vec<(u32, FaceEntry)>,
    latest_face_token: u32,
}

impl Faces {
    pub fn new() -> Self {
        let content_store = FaceEntry {
            info: FaceInfo {
                token: FaceToken::CONTENT_STORE,
                scope: FaceScope::Local,
                link_type: LinkType::PointToPoint,
            },
            sender: Box::new(NullSender),
        };
        Self {
            faces: alloc::vec![(FaceToken::CONTENT_STORE.0, content_store)],
            latest_face_token: FaceToken::FIRST_DYNAMIC - 1,
        }
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
        let token = self.latest_face_token.checked_add(1)?;
        self.latest_face_token = token;
        let entry = FaceEntry {
            info: FaceInfo {
                token: FaceToken(token),
                scope,
                link_type,
            },
            sender: Box::new(sender),
        };
        self.faces.push((token, entry));
        Some(FaceToken(token))
    }

    // Reserved faces cannot be removed
    pub fn remove_face(&mut self, token: FaceToken) -> bool {
        if token.0 < FaceToken::FIRST_DYNAMIC {
            return false;
        }
        match self.find_face(token) {
            Some(idx) => {
                self.faces.remove(idx);
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, token: FaceToken) -> bool {
        self.find_face(token).is_some()
    }

    pub fn info(&self, token: FaceToken) -> Option<FaceInfo> {
        self.find_face(token).map(|idx| self.faces[idx].1.info)
    }

    pub fn len(&self) -> usize {
        self.faces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }

    pub fn tokens(&self) -> impl Iterator<Item = FaceToken> + '_ {
        self.faces.iter().map(|(id, _)| FaceToken(*id))
    }

    pub(crate) fn sender_mut(&mut self, token: FaceToken) -> Option<&mut dyn FaceSender> {
        let idx = self.find_face(token)?;
        Some(self.faces[idx].1.sender.as_mut())
    }

    fn find_face(&self, token: FaceToken) -> Option<usize> {
        // Can do binary search because we always push higher ids to the end
        self.faces.binary_search_by_key(&token.0, |x| x.0).ok()
    }
}

impl Default for Faces {
    fn default() -> Self {
        Self::new()
    }
}
