//! Property-based tests for upload strategy selection.

use proptest::prelude::*;

use super::strategy::{UploadPolicy, UploadStrategy};

fn policy_strategy() -> impl Strategy<Value = UploadPolicy> {
    (1u64..64 * 1024, 32u64..16 * 1024, 1usize..16).prop_map(
        |(multipart_threshold, part_size, max_concurrent_parts)| UploadPolicy {
            multipart_threshold,
            part_size,
            max_concurrent_parts,
        },
    )
}

proptest! {
    /// Multipart is chosen iff size > threshold.
    #[test]
    fn prop_multipart_iff_above_threshold(
        policy in policy_strategy(),
        size in 0u64..256 * 1024,
    ) {
        let expected = if size > policy.multipart_threshold {
            UploadStrategy::Multipart
        } else {
            UploadStrategy::Direct
        };
        prop_assert_eq!(policy.select(size), expected);
        prop_assert_eq!(policy.plan(size).unwrap().strategy, expected);
    }

    /// Parts are numbered 1..=n, contiguous, and cover the payload exactly.
    #[test]
    fn prop_partition_covers_payload(
        policy in policy_strategy(),
        size in 1u64..256 * 1024,
    ) {
        let parts = policy.partition(size);
        prop_assert_eq!(parts.len() as u64, size.div_ceil(policy.part_size));

        let mut cursor = 0u64;
        for (index, part) in parts.iter().enumerate() {
            prop_assert_eq!(part.part_number as usize, index + 1);
            prop_assert_eq!(part.range.start, cursor);
            prop_assert!(!part.is_empty());
            prop_assert!(part.len() <= policy.part_size);
            cursor = part.range.end;
        }
        prop_assert_eq!(cursor, size);
    }

    /// Effective concurrency is min(configured, total_parts).
    #[test]
    fn prop_concurrency_bound(
        policy in policy_strategy(),
        size in 1u64..256 * 1024,
    ) {
        let plan = policy.plan(size).unwrap();
        if plan.strategy == UploadStrategy::Multipart {
            let total = plan.total_parts as usize;
            prop_assert_eq!(plan.concurrency, policy.max_concurrent_parts.min(total));
            prop_assert_eq!(plan.parts.len(), total);
        }
    }

    /// Plans stay within the part cap; payloads that would exceed it are rejected.
    #[test]
    fn prop_plan_respects_part_cap(
        part_size in 1u64..8,
        size in 0u64..100_000,
    ) {
        let policy = UploadPolicy {
            multipart_threshold: 0,
            part_size,
            max_concurrent_parts: 4,
        };
        let over_cap = size.div_ceil(part_size) > u64::from(UploadPolicy::MAX_PARTS);
        match policy.plan(size) {
            Ok(plan) => {
                prop_assert!(!over_cap);
                prop_assert!(plan.total_parts <= UploadPolicy::MAX_PARTS);
            }
            Err(_) => prop_assert!(over_cap),
        }
    }
}
