use serde::{Deserialize, Serialize};

/// Correlates a (group, device, grantee) tuple with the device-local ACE
/// holding the grant.
///
/// `uid` is never equal to `oid`: device owners are never granted a
/// redundant ACE on their own device.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AceRecord {
    pub aceid: String,
    pub gid: String,
    pub di: String,
    pub uid: String,
    pub oid: String,
}

/// Exact-match conditions over [`AceRecord`] fields; unset fields match
/// anything. An empty filter matches every record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AceFilter {
    pub aceid: Option<String>,
    pub gid: Option<String>,
    pub di: Option<String>,
    pub uid: Option<String>,
    pub oid: Option<String>,
}

impl AceFilter {
    pub fn group(gid: impl Into<String>) -> Self {
        Self {
            gid: Some(gid.into()),
            ..Default::default()
        }
    }

    pub fn aceid(mut self, aceid: impl Into<String>) -> Self {
        self.aceid = Some(aceid.into());
        self
    }

    pub fn device(mut self, di: impl Into<String>) -> Self {
        self.di = Some(di.into());
        self
    }

    pub fn grantee(mut self, uid: impl Into<String>) -> Self {
        self.uid = Some(uid.into());
        self
    }

    pub fn owner(mut self, oid: impl Into<String>) -> Self {
        self.oid = Some(oid.into());
        self
    }

    /// `(field, value)` pairs for every set condition, in a stable order.
    pub fn conditions(&self) -> Vec<(&'static str, &str)> {
        [
            ("aceid", &self.aceid),
            ("gid", &self.gid),
            ("di", &self.di),
            ("uid", &self.uid),
            ("oid", &self.oid),
        ]
        .into_iter()
        .filter_map(|(field, value)| value.as_deref().map(|v| (field, v)))
        .collect()
    }

    pub fn matches(&self, record: &AceRecord) -> bool {
        fn check(condition: &Option<String>, value: &str) -> bool {
            condition.as_deref().map(|c| c == value).unwrap_or(true)
        }

        check(&self.aceid, &record.aceid)
            && check(&self.gid, &record.gid)
            && check(&self.di, &record.di)
            && check(&self.uid, &record.uid)
            && check(&self.oid, &record.oid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> AceRecord {
        AceRecord {
            aceid: "a1".to_string(),
            gid: "g1".to_string(),
            di: "d1".to_string(),
            uid: "u2".to_string(),
            oid: "u1".to_string(),
        }
    }

    #[test]
    fn test_filter_matches() {
        let record = record();
        assert!(AceFilter::default().matches(&record));
        assert!(AceFilter::group("g1").device("d1").matches(&record));
        assert!(AceFilter::group("g1").owner("u1").matches(&record));
        assert!(!AceFilter::group("g1").grantee("u1").matches(&record));
        assert!(!AceFilter::group("g2").matches(&record));
    }

    #[test]
    fn test_conditions_order() {
        let filter = AceFilter::group("g1").grantee("u2").device("d1");
        assert_eq!(
            filter.conditions(),
            vec![("gid", "g1"), ("di", "d1"), ("uid", "u2")]
        );
    }
}
