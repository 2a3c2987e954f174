//  PRESET.rs
//    by Lut99
//
//  Created:
//    21 Feb 2023, 09:31:24
//  Last edited:
//    06 Apr 2023, 14:29:51
//  Auto updated?
//    Yes
//
//  Description:
//!   Implements the migration preset itself: reconcile the target
//!   registry's namespaces with the source's, generate the transfer
//!   rules for everything that has a home, then hand the rules to the
//!   engine.
//

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use log::{debug, info, warn};

use freighter_cfg::plan::TransferPlan;
use freighter_eng::engine::TransferEngine;
use freighter_eng::spec::TransferReport;
use specifications::transfer::ImageClient;

use crate::spec::{SourceVendor, TargetVendor};

pub use crate::errors::PresetError as Error;


/***** TESTS *****/





/***** LIBRARY *****/
/// Makes sure that every namespace of the source registry also exists in the target registry.
///
/// Creations that fail are retried up to `retries` times; before every retry round the target's namespaces are listed again, so a creation that reported failure but landed anyway is not retried.
///
/// # Arguments
/// - `source`: The API of the registry migrated from.
/// - `target`: The API of the registry migrated to.
/// - `retries`: How many rounds of retrying failed creations to allow.
///
/// # Returns
/// The namespaces that could not be created within the budget. These should be excluded from the migration; they do not abort it.
///
/// # Errors
/// This function errors if either registry's namespaces could not be enumerated.
pub async fn reconcile_namespaces(source: &impl SourceVendor, target: &impl TargetVendor, retries: usize) -> Result<HashSet<String>, Error> {
    let source_namespaces: Vec<String> = match source.list_namespaces().await {
        Ok(namespaces) => namespaces,
        Err(err)       => { return Err(Error::ListSourceNamespacesError{ err }); },
    };
    info!("Source registry has {} namespace(s)", source_namespaces.len());

    let mut failed: HashSet<String> = HashSet::new();
    for round in 0..=retries {
        if round > 0 && failed.is_empty() { break; }

        // Recompute what the target has; a creation that reported failure may still have landed
        let existing: HashSet<String> = match target.list_namespaces().await {
            Ok(namespaces) => namespaces.into_iter().collect(),
            Err(err)       => { return Err(Error::ListTargetNamespacesError{ err }); },
        };
        let candidates: Vec<String> = source_namespaces
            .iter()
            .filter(|ns| !existing.contains(ns.as_str()) && (round == 0 || failed.contains(ns.as_str())))
            .cloned()
            .collect();

        failed.clear();
        for namespace in candidates {
            match target.create_namespace(&namespace).await {
                Ok(_) => { debug!("Created namespace '{}' in target registry", namespace); },
                Err(err) => {
                    warn!("Could not create namespace '{}' in target registry: {}", namespace, err);
                    failed.insert(namespace);
                },
            }
        }
    }
    Ok(failed)
}



/// Runs the full migration preset: namespace reconciliation, rule generation, then the engine.
///
/// # Arguments
/// - `source`: The API of the registry migrated from.
/// - `target`: The API of the registry migrated to.
/// - `client`: The client with which the engine transfers the images themselves.
/// - `plan`: The transfer plan carrying the knobs (worker count, retries, credentials); its own seed map is ignored in favour of the generated rules.
///
/// # Returns
/// The engine's end-of-run report.
///
/// # Errors
/// This function errors if namespaces could not be enumerated or rules could not be generated. Individual failed namespace creations do not error; their repositories are skipped and the rest is transferred.
pub async fn run_preset<C: ImageClient>(source: &impl SourceVendor, target: &impl TargetVendor, client: Arc<C>, plan: &TransferPlan) -> Result<TransferReport, Error> {
    // Steps one through three: make sure every namespace has a home
    let failed: HashSet<String> = reconcile_namespaces(source, target, plan.retry_nums).await?;
    if !failed.is_empty() {
        let mut failed_list: Vec<&str> = failed.iter().map(|ns| ns.as_str()).collect();
        failed_list.sort();
        warn!("{} namespace(s) could not be created and will be skipped: {}", failed.len(), failed_list.join(", "));
    }

    // Step four: have the source generate the rules for everything else
    let rules: HashMap<String, String> = match source.generate_rules(&failed).await {
        Ok(rules) => rules,
        Err(err)  => { return Err(Error::GenerateRulesError{ err }); },
    };
    info!("Generated {} transfer rule(s)", rules.len());

    // Step five: run the engine; the generated map is keyed by target, hence the inverted run
    let plan: TransferPlan = TransferPlan{ images: rules, ..plan.clone() };
    Ok(TransferEngine::new(client, Arc::new(plan)).run(true).await)
}
