use core::fmt;

use serde::Deserialize;

use crate::{face::FaceInfo, packet::Data};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum UnsolicitedDataDecision {
    Drop,
    Cache,
}

impl fmt::Display for UnsolicitedDataDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            UnsolicitedDataDecision::Drop => "drop",
            UnsolicitedDataDecision::Cache => "cache",
        })
    }
}

/// Decides whether Data that matched no pending Interest is still worth caching.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UnsolicitedDataPolicy {
    DropAll,
    // Data pushed by applications on this host
    #[default]
    AdmitLocal,
    AdmitNetwork,
    AdmitAll,
}

impl UnsolicitedDataPolicy {
    pub fn decide(&self, ingress: &FaceInfo, _data: &Data) -> UnsolicitedDataDecision {
        let admit = match self {
            UnsolicitedDataPolicy::DropAll => false,
            UnsolicitedDataPolicy::AdmitLocal => ingress.is_local(),
            UnsolicitedDataPolicy::AdmitNetwork => !ingress.is_local(),
            UnsolicitedDataPolicy::AdmitAll => true,
        };
        if admit {
            UnsolicitedDataDecision::Cache
        } else {
            UnsolicitedDataDecision::Drop
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::face::{FaceScope, FaceToken, LinkType};

    #[test]
    fn test_policies() {
        let data = Data::new("/a".parse().unwrap(), b"");
        let local = FaceInfo {
            token: FaceToken(256),
            scope: FaceScope::Local,
            link_type: LinkType::PointToPoint,
        };
        let remote = FaceInfo {
            scope: FaceScope::NonLocal,
            ..local
        };

        let cases = [
            (UnsolicitedDataPolicy::DropAll, false, false),
            (UnsolicitedDataPolicy::AdmitLocal, true, false),
            (UnsolicitedDataPolicy::AdmitNetwork, false, true),
            (UnsolicitedDataPolicy::AdmitAll, true, true),
        ];
        for (policy, from_local, from_remote) in cases {
            let cache = |info| policy.decide(info, &data) == UnsolicitedDataDecision::Cache;
            assert_eq!(cache(&local), from_local, "{policy:?} local");
            assert_eq!(cache(&remote), from_remote, "{policy:?} remote");
        }
    }
}
