pub mod cli;
pub mod client;
pub mod collectors;
pub mod config;
pub mod identify;
pub mod models;
pub mod report;
pub mod service;
pub mod utils;

use crate::cli::{Action, Invocation, USAGE};
use crate::config::AppConfig;
use crate::report::{listing_line, listings, report_line, to_json};
use crate::service::SensorService;
use anyhow::Context;
use log::{debug, info};

pub async fn run(config: AppConfig, invocation: Invocation) -> anyhow::Result<()> {
    info!("Starting temper");

    let mut sensors = config.sensors;
    if invocation.force.is_some() {
        sensors.force = invocation.force;
    }
    debug!("Sensor configuration: {:?}", sensors);
    let service = SensorService::new(&sensors);

    match invocation.action {
        Action::Help => println!("{}", USAGE),
        Action::List => {
            let devices = service.list().await.context("Failed to list USB devices")?;
            let listings = listings(&devices, service.identifier());
            if invocation.json {
                println!("{}", to_json(&listings)?);
            } else {
                for listing in &listings {
                    println!("{}", listing_line(listing));
                }
            }
        }
        Action::Read => {
            let reports = service.read().await.context("Failed to read sensors")?;
            if invocation.json {
                println!("{}", to_json(&reports)?);
            } else {
                for report in &reports {
                    println!("{}", report_line(report));
                }
            }
        }
    }

    Ok(())
}
