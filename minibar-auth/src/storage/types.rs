use serde::{Deserialize, Serialize};

/// Data stored in the cache. Values are JSON-serialized by the callers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheData {
    pub value: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_data_serialization() {
        let data = CacheData {
            value: "test value".to_string(),
        };

        let json = serde_json::to_string(&data).expect("Failed to serialize CacheData");
        assert_eq!(json, "{\"value\":\"test value\"}");

        let back: CacheData = serde_json::from_str(&json).expect("Failed to deserialize");
        assert_eq!(back.value, data.value);
    }
}
