use serde::{Deserialize, Deserializer, Serialize};

/// A launchpad project row as returned by the chain node. Read-only here.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Project {
    #[serde(deserialize_with = "int_from_num_or_str")]
    pub id: i64,
    pub creator: String,
    pub project_name: String,
    pub nft_name: String,
    #[serde(default)]
    pub nft_img: String,
    #[serde(default)]
    pub desc: String,
    #[serde(deserialize_with = "int_from_num_or_str")]
    pub init_nft_number: i64,
    pub init_nft_price: String,
    pub create_time: String,
    pub last_round: String,
    #[serde(deserialize_with = "int_from_num_or_str")]
    pub sec_per_round: i64,
}

/// A project followed by the countdown account.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LikedProject {
    #[serde(deserialize_with = "int_from_num_or_str")]
    pub pid: i64,
    #[serde(default)]
    pub time: String,
}

/// Balances of a single account across the two configured token contracts.
/// Each list holds asset strings such as `"12.5000 EOS"`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct BalanceSnapshot {
    pub primary: Vec<String>,
    pub secondary: Vec<String>,
}

impl BalanceSnapshot {
    pub fn is_empty(&self) -> bool {
        self.primary.is_empty() && self.secondary.is_empty()
    }
}

/// The node encodes 64-bit integers either as JSON numbers or as strings.
fn int_from_num_or_str<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumOrStr {
        Num(i64),
        Str(String),
    }

    match NumOrStr::deserialize(deserializer)? {
        NumOrStr::Num(n) => Ok(n),
        NumOrStr::Str(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}
