//  MAIN.rs
//    by Lut99
//
//  Created:
//    27 Feb 2023, 10:19:45
//  Last edited:
//    06 Apr 2023, 15:03:12
//  Auto updated?
//    Yes
//
//  Description:
//!   Entrypoint to the `freighter` tool.
//

use std::path::PathBuf;
use std::sync::Arc;

use clap::{ArgAction::SetTrue, Parser};
use dotenvy::dotenv;
use log::LevelFilter;
use log::{debug, error, info};

use freighter_cfg::plan::TransferPlan;
use freighter_eng::engine::TransferEngine;
use freighter_eng::spec::TransferReport;
use freighter_reg::client::RegistryClient;
use freighter_tcr::api::{CcrApi, TcrApi, VendorCredentials};
use freighter_tcr::preset::run_preset;


#[derive(Parser)]
#[clap(version = env!("CARGO_PKG_VERSION"))]
struct Opts {
    /// Print debug info
    #[clap(long, action=SetTrue, env = "DEBUG")]
    debug        : bool,

    /// The path to the transfer plan file.
    #[clap(short, long, default_value = "./transfer.yml", env = "PLAN")]
    plan         : PathBuf,
    /// If given, overrides the number of workers per pool from the plan file.
    #[clap(short, long, env = "ROUTINE_NUMS")]
    routine_nums : Option<usize>,
    /// If given, overrides the number of retry rounds from the plan file.
    #[clap(short='R', long, env = "RETRY_NUMS")]
    retry_nums   : Option<usize>,

    /// If given, migrates the whole source registry (CCR) into the target registry (TCR) instead of following the plan's image list.
    #[clap(long, action=SetTrue, env = "CCR_TO_TCR")]
    ccr_to_tcr   : bool,
    /// The region of the source registry (CCR->TCR only).
    #[clap(long, default_value = "ap-guangzhou", env = "CCR_REGION")]
    ccr_region   : String,
    /// The region of the target registry (CCR->TCR only).
    #[clap(long, default_value = "ap-guangzhou", env = "TCR_REGION")]
    tcr_region   : String,
    /// The name of the target registry instance (CCR->TCR only).
    #[clap(long, default_value = "", env = "TCR_NAME")]
    tcr_name     : String,
    /// The secret id with which vendor API calls are signed (CCR->TCR only).
    #[clap(long, default_value = "", env = "SECRET_ID")]
    secret_id    : String,
    /// The secret key with which vendor API calls are signed (CCR->TCR only).
    #[clap(long, default_value = "", env = "SECRET_KEY")]
    secret_key   : String,
}


#[tokio::main]
async fn main() {
    dotenv().ok();
    let opts = Opts::parse();

    // Configure logger.
    let mut logger = env_logger::builder();
    logger.format_module_path(false);
    if opts.debug {
        logger.filter_level(LevelFilter::Debug).init();
    } else {
        logger.filter_level(LevelFilter::Info).init();
    }
    info!("Initializing freighter v{}...", env!("CARGO_PKG_VERSION"));

    // Load the transfer plan, with the command line overriding its knobs
    let mut plan: TransferPlan = match TransferPlan::from_path(&opts.plan) {
        Ok(plan) => plan,
        Err(err) => {
            error!("{}", err);
            std::process::exit(1);
        },
    };
    if let Some(routine_nums) = opts.routine_nums { plan.routine_nums = routine_nums; }
    if let Some(retry_nums) = opts.retry_nums { plan.retry_nums = retry_nums; }
    debug!("Running {} worker(s) per pool, {} retry round(s)", plan.routine_nums, plan.retry_nums);

    // Prepare the registry client the engine will transfer with
    let client: Arc<RegistryClient> = match RegistryClient::new() {
        Ok(client) => Arc::new(client),
        Err(err)   => {
            error!("Failed to create the registry client: {}", err);
            std::process::exit(1);
        },
    };

    // Run either the vendor migration preset or the plan's own image list
    let report: TransferReport = if opts.ccr_to_tcr {
        if opts.tcr_name.is_empty() {
            error!("'--tcr-name' is required for a CCR->TCR migration");
            std::process::exit(1);
        }
        if opts.secret_id.is_empty() || opts.secret_key.is_empty() {
            error!("'--secret-id' and '--secret-key' are required for a CCR->TCR migration");
            std::process::exit(1);
        }
        let http: reqwest::Client = match reqwest::Client::builder().build() {
            Ok(http) => http,
            Err(err) => {
                error!("Failed to create the vendor API client: {}", err);
                std::process::exit(1);
            },
        };

        let creds: VendorCredentials = VendorCredentials::new(&opts.secret_id, &opts.secret_key);
        let source: CcrApi = CcrApi::new(http.clone(), creds.clone(), &opts.ccr_region, format!("{}.tencentcloudcr.com", opts.tcr_name));
        let target: TcrApi = TcrApi::new(http, creds, &opts.tcr_region, &opts.tcr_name);
        match run_preset(&source, &target, client, &plan).await {
            Ok(report) => report,
            Err(err)   => {
                error!("{}", err);
                std::process::exit(1);
            },
        }
    } else {
        TransferEngine::new(client, Arc::new(plan)).run(false).await
    };

    // Residual failures live in the summary, not in the exit code
    println!("{}", report);
}
