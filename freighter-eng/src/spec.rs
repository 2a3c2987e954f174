//  SPEC.rs
//    by Lut99
//
//  Created:
//    08 Feb 2023, 13:30:47
//  Last edited:
//    04 Apr 2023, 14:14:32
//  Auto updated?
//    Yes
//
//  Description:
//!   Defines the work items that flow through the transfer pipeline and
//!   the report that comes out of it.
//

use std::fmt::{Display, Formatter, Result as FResult};


/***** LIBRARY *****/
/// Specifies a transfer rule that still awaits expansion: a source reference and a target reference, both unparsed.
///
/// The target may be empty, in which case expansion synthesises one from the plan's default registry and namespace.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct URLPair {
    /// The reference to copy from.
    pub source : String,
    /// The reference to copy to. May be empty.
    pub target : String,
}

impl URLPair {
    /// Constructor for the URLPair.
    ///
    /// # Arguments
    /// - `source`: The reference to copy from.
    /// - `target`: The reference to copy to (may be the empty string).
    ///
    /// # Returns
    /// A new URLPair instance.
    #[inline]
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source : source.into(),
            target : target.into(),
        }
    }
}

impl Display for URLPair {
    #[inline]
    fn fmt(&self, f: &mut Formatter<'_>) -> FResult {
        write!(f, "{} -> {}", self.source, if !self.target.is_empty() { self.target.as_str() } else { "<default>" })
    }
}



/// Specifies the end-of-run summary: what got transferred and what kept failing after all retry rounds.
#[derive(Clone, Debug)]
pub struct TransferReport {
    /// How many jobs completed successfully (over all rounds).
    pub completed    : usize,
    /// The (source, target) references of every job that still failed after the final round.
    pub failed_jobs  : Vec<(String, String)>,
    /// The (source, target) references of every rule that still failed to expand after the final round.
    pub failed_pairs : Vec<(String, String)>,
}

impl TransferReport {
    /// Returns whether this run completed without any residual failures.
    #[inline]
    pub fn is_clean(&self) -> bool { self.failed_jobs.is_empty() && self.failed_pairs.is_empty() }
}

impl Display for TransferReport {
    fn fmt(&self, f: &mut Formatter<'_>) -> FResult {
        for (source, target) in &self.failed_jobs {
            writeln!(f, "Failed transfer : {} -> {}", source, target)?;
        }
        for (source, target) in &self.failed_pairs {
            writeln!(f, "Failed rule     : {} -> {}", source, if !target.is_empty() { target.as_str() } else { "<default>" })?;
        }
        write!(f, "{} image(s) transferred, {} transfer(s) failed, {} rule(s) failed", self.completed, self.failed_jobs.len(), self.failed_pairs.len())
    }
}
