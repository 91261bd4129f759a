use crate::allocation::session::AllocationSession;
use crate::error::{Result, ValidationError};
use crate::input::{assign_owner, parse};
use crate::ledger::snapshot::Snapshot;
use crate::ledger::Purpose;
use crate::money::Amount;
use crate::output::write;
use crate::settlement::compose::compose_lines;

use std::sync::Arc;

/// Allocate `target` against a CSV export of an agent's balances, oldest
/// first, and write the settlement lines it would send.
///
/// Nothing is sent anywhere: this is the offline version of
/// `PaymentDesk::pay_with_balances`. The lines are written even when the
/// balances don't cover the target; check the returned session.
pub fn run(
    input_stream: impl std::io::Read,
    output_stream: impl std::io::Write,
    owner_id: &str,
    purpose: Purpose,
    target: Amount,
) -> Result<AllocationSession> {
    let owner_id = owner_id.trim();
    if owner_id.is_empty() {
        return Err(ValidationError::MissingOwner.into());
    }

    let balances = parse(input_stream)?
        .into_iter()
        .filter_map(|balance| assign_owner(balance, owner_id));
    let snapshot = Arc::new(Snapshot::new(owner_id, purpose, balances));

    let session = AllocationSession::auto(snapshot, target)?;
    let lines = compose_lines(session.entries(), session.snapshot(), session.remaining_map())?;
    write(output_stream, &lines)?;

    Ok(session)
}
