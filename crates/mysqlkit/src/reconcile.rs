//! Grant reconciliation.
//!
//! The observed privilege set is authoritative for *which* privileges exist;
//! the desired set only contributes spelling. This keeps state stable when
//! users write `select` and the grant table reports `SELECT`, while still
//! surfacing privileges granted out of band.

use crate::backend::Row;
use crate::error::{Error, Result};
use crate::privilege::{self, Privilege};

/// Privileges to persist for a grant.
///
/// Walks `observed` in order and emits the matching desired entry when one
/// exists (case-insensitively), else the observed entry. Desired entries with
/// no observed counterpart are dropped.
pub fn reconcile(desired: &[Privilege], observed: &[Privilege]) -> Vec<Privilege> {
    observed
        .iter()
        .map(|seen| {
            desired
                .iter()
                .find(|wanted| wanted.eq_ignore_case(seen))
                .unwrap_or(seen)
                .clone()
        })
        .collect()
}

/// Reconciled view of one grant-table row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconciledGrant {
    /// Privileges to persist
    pub privileges: Vec<Privilege>,
    /// Grant option as observed
    pub with_grant_option: bool,
}

/// Reconcile the desired privileges of `target` against its grant-table row.
///
/// A missing row, or a row with no privilege flag set, means the grant is gone.
pub fn reconcile_grant(
    target: &str,
    desired: &[Privilege],
    row: Option<&Row>,
) -> Result<ReconciledGrant> {
    let row = row.ok_or_else(|| Error::not_found(format!("grant for {target}")))?;
    let observed = privilege::decode(row);
    if observed.is_empty() {
        return Err(Error::not_found(format!("grant for {target}")));
    }
    Ok(ReconciledGrant {
        privileges: reconcile(desired, &observed),
        with_grant_option: privilege::decode_grant_option(row),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::Value;

    fn privs(names: &[&str]) -> Vec<Privilege> {
        names.iter().map(|n| Privilege::from(*n)).collect()
    }

    #[test]
    fn test_desired_spelling_is_kept() {
        assert_eq!(reconcile(&privs(&["select"]), &privs(&["SELECT"])), privs(&["select"]));
    }

    #[test]
    fn test_empty_desired_adopts_observed() {
        assert_eq!(
            reconcile(&[], &privs(&["SELECT", "INSERT"])),
            privs(&["SELECT", "INSERT"])
        );
    }

    #[test]
    fn test_is_a_fixed_point() {
        let desired = privs(&["insert", "Trigger", "select", "DROP"]);
        let observed = privs(&["SELECT", "INSERT", "UPDATE", "TRIGGER"]);
        let once = reconcile(&desired, &observed);
        assert_eq!(reconcile(&once, &observed), once);
    }

    #[test]
    fn test_tracks_observed_membership() {
        let desired = privs(&["drop", "select"]);
        let observed = privs(&["SELECT", "EVENT"]);
        let result = reconcile(&desired, &observed);

        // One output per observed privilege, in observed order.
        assert_eq!(result, privs(&["select", "EVENT"]));
        for (out, seen) in result.iter().zip(&observed) {
            assert!(out.eq_ignore_case(seen));
        }
    }

    #[test]
    fn test_missing_row_is_not_found() {
        let err = reconcile_grant("'reader'@'%' on app", &[], None).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_row_without_privileges_is_not_found() {
        let row = Row::new().with("Select_priv", "N").with("Grant_priv", "Y");
        let err = reconcile_grant("'reader'@'%' on app", &[], Some(&row)).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_grant_option_comes_from_row() {
        let row = Row::new()
            .with("Select_priv", "Y")
            .with("Grant_priv", Value::from("Y"));
        let grant = reconcile_grant("'reader'@'%' on app", &privs(&["Select"]), Some(&row)).unwrap();
        assert_eq!(grant.privileges, privs(&["Select"]));
        assert!(grant.with_grant_option);
    }
}
