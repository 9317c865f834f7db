//! Captured CLI output used by the integration tests.

pub const HELM_VERSION: &str = r#"version.BuildInfo{Version:"v3.14.2", GitCommit:"c309b6f0ff63856811846ce18f3bdc93d2b4d54b", GitTreeState:"clean", GoVersion:"go1.21.7"}"#;

pub const HELM_REPO_LIST: &str = "NAME   \tURL\n\
bitnami\thttps://charts.bitnami.com/bitnami\n\
jetstack\thttps://charts.jetstack.io\n";

pub const HELM_LIST_ALL: &str = "NAME   \tNAMESPACE\tREVISION\tUPDATED                                \tSTATUS  \tCHART        \tAPP VERSION\n\
mysql  \tdb       \t1       \t2024-03-01 10:12:44.123 +0000 UTC\tdeployed\tmysql-9.12.1 \t8.0.35\n\
redis  \tcache    \t2       \t2024-03-01 10:15:02.456 +0000 UTC\tdeployed\tredis-18.4.0 \t7.2.3\n";

pub const HELM_LIST_DB: &str = "NAME   \tNAMESPACE\tREVISION\tUPDATED                                \tSTATUS  \tCHART        \tAPP VERSION\n\
mysql  \tdb       \t1       \t2024-03-01 10:12:44.123 +0000 UTC\tdeployed\tmysql-9.12.1 \t8.0.35\n";

pub const HELM_LIST_STALE: &str = "NAME   \tNAMESPACE\tREVISION\tUPDATED\tSTATUS\tCHART\tAPP VERSION\n\
mysql  \tdb       \t1       \t-\tdeployed\tmysql-9.12.1\t8.0.35\n\
ghost  \tdb       \t1       \t-\tfailed\tghost-19.0.0\t5.0\n";

pub const NODE_INFO: &str = "Node Name : nodeA\n\
Node Role : Production\n\
Sync Status : Synced\n\
Last Failover Time :\n";
