//  ERRORS.rs
//    by Lut99
//
//  Created:
//    08 Feb 2023, 13:26:11
//  Last edited:
//    04 Apr 2023, 14:11:50
//  Auto updated?
//    Yes
//
//  Description:
//!   Defines errors that occur in the `freighter-eng` crate.
//

use std::error::Error;
use std::fmt::{Display, Formatter, Result as FResult};

use specifications::errors::{ReferenceParseError, TransferError};


/***** LIBRARY *****/
/// Defines the reasons why a transfer rule could not be expanded into jobs.
///
/// None of these are fatal to a run; an unexpandable rule is parked in the failed-rules queue and retried.
#[derive(Debug)]
pub enum ExpansionError {
    /// The rule carried no source reference at all.
    EmptySource,
    /// The source reference did not parse.
    SourceParseError{ raw: String, err: ReferenceParseError },
    /// The target reference did not parse.
    TargetParseError{ raw: String, err: ReferenceParseError },
    /// The rule carried no target and the plan has no default registry + namespace to synthesise one from.
    NoDefaultTarget{ source: String },

    /// The source carries a list of tags but the target carries a different tag.
    TagListMismatch{ source_tags: String, target_tag: String },
    /// The source means all tags but the target pins one.
    UnbalancedTags{ source: String, target_tag: String },

    /// Could not open the source side of a rule.
    SourceOpenError{ source: String, err: TransferError },
    /// Could not open the target side of a rule.
    TargetOpenError{ target: String, err: TransferError },
    /// Could not list the tags of an all-tags source.
    TagListError{ source: String, err: TransferError },
}

impl Display for ExpansionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> FResult {
        use ExpansionError::*;
        match self {
            EmptySource                              => write!(f, "Cannot expand a rule without a source reference"),
            SourceParseError{ raw, err }             => write!(f, "Cannot parse source reference '{}': {}", raw, err),
            TargetParseError{ raw, err }             => write!(f, "Cannot parse target reference '{}': {}", raw, err),
            NoDefaultTarget{ source }                => write!(f, "Rule for '{}' has no target; a default registry and namespace are required to synthesise one", source),

            TagListMismatch{ source_tags, target_tag } => write!(f, "Source carries tags '{}' but target carries tag '{}'; the target tag must be empty or identical to the source's", source_tags, target_tag),
            UnbalancedTags{ source, target_tag }       => write!(f, "Source '{}' means all tags but target pins tag '{}'; a tag must be set on both sides or neither", source, target_tag),

            SourceOpenError{ source, err }           => write!(f, "Could not open source image '{}': {}", source, err),
            TargetOpenError{ target, err }           => write!(f, "Could not open target image '{}': {}", target, err),
            TagListError{ source, err }              => write!(f, "Could not list tags of '{}': {}", source, err),
        }
    }
}

impl Error for ExpansionError {}
