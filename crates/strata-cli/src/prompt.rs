//! Interactive branch selection
//!
//! The menu and prompt are written to stderr so stdout stays reserved for
//! the readiness message. Input accepts either a list number or an exact
//! branch name; anything else re-prompts.

use std::io::Write;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};

use strata_api::Branch;

use crate::resolver::ResolveError;

/// Ask the operator which branch to connect to
pub async fn select_branch(database: &str, branches: &[Branch]) -> Result<String, ResolveError> {
    let mut input = BufReader::new(tokio::io::stdin());
    let mut out = std::io::stderr();

    select_branch_from(&mut input, &mut out, database, branches).await
}

async fn select_branch_from<R, W>(
    input: &mut R,
    out: &mut W,
    database: &str,
    branches: &[Branch],
) -> Result<String, ResolveError>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    writeln!(out, "Database {} has multiple branches:", database)?;
    for (index, branch) in branches.iter().enumerate() {
        let marker = if branch.production {
            " (production)"
        } else {
            ""
        };
        writeln!(out, "  {}. {}{}", index + 1, branch.name, marker)?;
    }

    loop {
        write!(out, "Select a branch [1-{}]: ", branches.len())?;
        out.flush()?;

        let mut line = String::new();
        if input.read_line(&mut line).await? == 0 {
            // EOF without a choice
            return Err(ResolveError::NoSelection);
        }

        if let Some(name) = match_selection(line.trim(), branches) {
            return Ok(name);
        }

        writeln!(
            out,
            "Enter a number between 1 and {} or a branch name",
            branches.len()
        )?;
    }
}

/// Map an input line to a branch name, if it identifies one
fn match_selection(input: &str, branches: &[Branch]) -> Option<String> {
    if input.is_empty() {
        return None;
    }

    if let Ok(number) = input.parse::<usize>() {
        if (1..=branches.len()).contains(&number) {
            return Some(branches[number - 1].name.clone());
        }
        return None;
    }

    branches
        .iter()
        .find(|branch| branch.name == input)
        .map(|branch| branch.name.clone())
}
