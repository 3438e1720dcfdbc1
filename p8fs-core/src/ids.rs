//! ABOUTME: Deterministic id derivation (spec §6 "Persisted deterministic ids")
//! ABOUTME: File ids and file-derived resource chunk ids are pure functions of their inputs

use uuid::Uuid;

/// `File.id = uuid5(namespace=DNS, tenant_id + ":" + uri)`.
#[must_use]
pub fn file_id(tenant_id: &str, uri: &str) -> Uuid {
    let name = format!("{tenant_id}:{uri}");
    Uuid::new_v5(&Uuid::NAMESPACE_DNS, name.as_bytes())
}

/// `Resource.id = uuid5(file_id, chunk_index)` for file-derived chunks.
#[must_use]
pub fn resource_chunk_id(file_id: Uuid, chunk_index: usize) -> Uuid {
    Uuid::new_v5(&file_id, chunk_index.to_string().as_bytes())
}

/// Fixed id of the one `p8fs-user-info` rolling-summary resource a tenant
/// ever has (§3 "per-tenant rolling summary").
#[must_use]
pub fn user_info_id(tenant_id: &str) -> Uuid {
    let name = format!("{tenant_id}:p8fs-user-info");
    Uuid::new_v5(&Uuid::NAMESPACE_DNS, name.as_bytes())
}

/// KV key holding the full expanded body of one compressed session turn
/// (§6 "Session-message convention").
#[must_use]
pub fn session_message_key(session_id: Uuid, ordinal: u32) -> String {
    format!("session-{session_id}-msg-{ordinal}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_id_is_deterministic() {
        let a = file_id("tenant-A", "buckets/tenant-A/docs/Sample.md");
        let b = file_id("tenant-A", "buckets/tenant-A/docs/Sample.md");
        assert_eq!(a, b);
    }

    #[test]
    fn file_id_differs_by_tenant() {
        let a = file_id("tenant-A", "buckets/tenant-A/docs/Sample.md");
        let b = file_id("tenant-B", "buckets/tenant-A/docs/Sample.md");
        assert_ne!(a, b);
    }

    #[test]
    fn chunk_ids_are_stable_and_distinct() {
        let fid = file_id("tenant-A", "buckets/tenant-A/docs/Sample.md");
        let c0 = resource_chunk_id(fid, 0);
        let c1 = resource_chunk_id(fid, 1);
        assert_ne!(c0, c1);
        assert_eq!(c0, resource_chunk_id(fid, 0));
    }

    #[test]
    fn user_info_id_is_stable_per_tenant_and_differs_across_tenants() {
        let a = user_info_id("tenant-A");
        assert_eq!(a, user_info_id("tenant-A"));
        assert_ne!(a, user_info_id("tenant-B"));
    }

    #[test]
    fn session_message_key_matches_the_documented_convention() {
        let session_id = Uuid::new_v5(&Uuid::NAMESPACE_DNS, b"tenant-A:session-1");
        assert_eq!(session_message_key(session_id, 3), format!("session-{session_id}-msg-3"));
    }
}
