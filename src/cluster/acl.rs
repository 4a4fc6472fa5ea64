//! ACL model. Names match the Kafka CLI spelling; unknown names parse
//! leniently so a typo shows up as `Unknown` on the broker side.

use std::fmt;

use serde::Serialize;

macro_rules! named_enum {
    ($name:ident, $fallback:ident, { $($variant:ident => $text:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
        pub enum $name {
            $($variant,)+
            $fallback,
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text,)+
                    $name::$fallback => stringify!($fallback),
                }
            }

            pub fn parse(raw: &str) -> Self {
                match raw.trim() {
                    $($text => $name::$variant,)+
                    _ => $name::$fallback,
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

named_enum!(ResourceType, Unknown, {
    Topic => "Topic",
    Group => "Group",
    Cluster => "Cluster",
    TransactionalId => "TransactionalId",
    DelegationToken => "DelegationToken",
});

named_enum!(PatternType, Any, {
    Literal => "Literal",
    Prefixed => "Prefixed",
});

named_enum!(AclOperation, Unknown, {
    Read => "Read",
    Write => "Write",
    Create => "Create",
    Delete => "Delete",
    Alter => "Alter",
    Describe => "Describe",
    ClusterAction => "ClusterAction",
    DescribeConfigs => "DescribeConfigs",
    AlterConfigs => "AlterConfigs",
    IdempotentWrite => "IdempotentWrite",
    All => "All",
});

named_enum!(AclPermission, Unknown, {
    Allow => "Allow",
    Deny => "Deny",
});

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct AclEntry {
    pub principal: String,
    pub host: String,
    pub operation: AclOperation,
    pub permission: AclPermission,
    pub resource_type: ResourceType,
    pub resource_name: String,
    pub pattern_type: PatternType,
}

impl AclEntry {
    /// Delete-filter semantics: `Any` pattern and `All` operation act as wildcards.
    pub fn matches_filter(&self, filter: &AclEntry) -> bool {
        self.principal == filter.principal
            && self.host == filter.host
            && self.resource_type == filter.resource_type
            && self.resource_name == filter.resource_name
            && self.permission == filter.permission
            && (filter.pattern_type == PatternType::Any || self.pattern_type == filter.pattern_type)
            && (filter.operation == AclOperation::All || self.operation == filter.operation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip_and_unknown_falls_back() {
        for op in AclOperation::ALL {
            assert_eq!(AclOperation::parse(op.as_str()), *op);
        }
        assert_eq!(AclOperation::parse("Launch"), AclOperation::Unknown);
        assert_eq!(PatternType::parse("Wildcard"), PatternType::Any);
        assert_eq!(ResourceType::parse("Topic").to_string(), "Topic");
    }
}
