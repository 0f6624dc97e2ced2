//! Deterministic checksum over generated migration SQL (§4.6 step 5),
//! recorded in `redi_migrations.checksum` and reverified on `file`-mode
//! reapply. Crate: `sha2`, since the teacher's workspace has no existing
//! hashing dependency this concern could reuse.

use sha2::{Digest, Sha256};

pub fn checksum_statements(statements: &[String]) -> String {
    let mut hasher = Sha256::new();
    for statement in statements {
        hasher.update(statement.as_bytes());
        hasher.update(b"\n");
    }
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_statements_produce_same_checksum() {
        let a = vec!["CREATE TABLE foo (id INTEGER)".to_string()];
        let b = vec!["CREATE TABLE foo (id INTEGER)".to_string()];
        assert_eq!(checksum_statements(&a), checksum_statements(&b));
    }

    #[test]
    fn different_statements_produce_different_checksums() {
        let a = vec!["CREATE TABLE foo (id INTEGER)".to_string()];
        let b = vec!["CREATE TABLE bar (id INTEGER)".to_string()];
        assert_ne!(checksum_statements(&a), checksum_statements(&b));
    }
}
