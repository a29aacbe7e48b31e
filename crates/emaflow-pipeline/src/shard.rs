//! Symbol-to-shard routing and batch partitioning.

use std::collections::HashSet;

use emaflow_core::{Batch, Event};

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0100_0000_01b3;

/// 64-bit FNV-1a.
///
/// Stable across processes and platforms, unlike `RandomState`.
fn fnv1a(bytes: &[u8]) -> u64 {
    bytes.iter().fold(FNV_OFFSET, |hash, b| {
        (hash ^ u64::from(*b)).wrapping_mul(FNV_PRIME)
    })
}

/// Owning shard of `symbol`.
///
/// `num_shards` must be non-zero.
#[inline]
pub fn shard_for(symbol: &str, num_shards: usize) -> usize {
    (fnv1a(symbol.as_bytes()) % num_shards as u64) as usize
}

/// The slice of one batch owned by a single shard.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ShardWork {
    pub seq_id: u64,
    /// Window anchor for trackers created by this work item.
    pub reference_secs: i64,
    pub events: Vec<Event>,
    pub lookup_symbols: Vec<String>,
    pub is_last: bool,
}

/// Split `batch` into one work item per shard.
///
/// Every shard receives an item, possibly empty, so that each shard
/// reports exactly once per batch. Events keep their batch order within a
/// shard. Lookup symbols are deduplicated, first occurrence wins.
pub fn partition(batch: Batch, num_shards: usize, reference_secs: i64) -> Vec<ShardWork> {
    let mut parts: Vec<ShardWork> = (0..num_shards)
        .map(|_| ShardWork {
            seq_id: batch.seq_id,
            reference_secs,
            is_last: batch.is_last,
            ..Default::default()
        })
        .collect();

    for event in batch.events {
        let shard = shard_for(&event.symbol, num_shards);
        parts[shard].events.push(event);
    }

    let mut seen = HashSet::with_capacity(batch.lookup_symbols.len());
    for symbol in batch.lookup_symbols {
        if seen.insert(symbol.clone()) {
            let shard = shard_for(&symbol, num_shards);
            parts[shard].lookup_symbols.push(symbol);
        }
    }

    parts
}

#[cfg(test)]
mod tests {
    use super::*;
    use emaflow_core::{SecurityType, Timestamp};

    fn event(symbol: &str, secs: i64) -> Event {
        Event::new(symbol, SecurityType::Equity, 1.0, Timestamp::from_secs(secs))
    }

    #[test]
    fn test_fnv1a_known_vectors() {
        assert_eq!(fnv1a(b""), 0xcbf2_9ce4_8422_2325);
        assert_eq!(fnv1a(b"a"), 0xaf63_dc4c_8601_ec8c);
        assert_eq!(fnv1a(b"foobar"), 0x8594_4171_f739_67e8);
    }

    #[test]
    fn test_shard_for_is_stable_and_in_range() {
        for symbol in ["IBM.FR", "AAPL", "X", "a-very-long-symbol-name"] {
            let shard = shard_for(symbol, 7);
            assert!(shard < 7);
            assert_eq!(shard, shard_for(symbol, 7));
        }
        assert_eq!(shard_for("anything", 1), 0);
    }

    #[test]
    fn test_partition_routes_by_symbol() {
        let batch = Batch::new(
            9,
            vec![event("A", 1), event("B", 2), event("A", 3), event("C", 4)],
            vec!["A".to_string(), "C".to_string(), "A".to_string()],
        );
        let parts = partition(batch, 4, 100);

        assert_eq!(parts.len(), 4);
        let total: usize = parts.iter().map(|p| p.events.len()).sum();
        assert_eq!(total, 4);

        for (shard, part) in parts.iter().enumerate() {
            assert_eq!(part.seq_id, 9);
            assert_eq!(part.reference_secs, 100);
            assert!(!part.is_last);
            assert!(part.events.iter().all(|e| shard_for(&e.symbol, 4) == shard));
            assert!(part.lookup_symbols.iter().all(|s| shard_for(s, 4) == shard));
        }

        // Per-symbol order is kept.
        let a_shard = shard_for("A", 4);
        let a_secs: Vec<i64> = parts[a_shard]
            .events
            .iter()
            .filter(|e| e.symbol == "A")
            .map(|e| e.last_trade.seconds)
            .collect();
        assert_eq!(a_secs, vec![1, 3]);

        let lookups: usize = parts.iter().map(|p| p.lookup_symbols.len()).sum();
        assert_eq!(lookups, 2);
    }

    #[test]
    fn test_partition_empty_batch_reaches_every_shard() {
        let parts = partition(Batch::new(1, vec![], vec![]).last(), 3, 0);
        assert_eq!(parts.len(), 3);
        assert!(parts.iter().all(|p| p.events.is_empty() && p.is_last));
    }
}
