// Copyright 2025 Crrow
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::{path::PathBuf, sync::Arc};

use clap::{Args, Parser, Subcommand};
use opqueue_app::AppConfig;
use opqueue_common_storage_queue::{OperationInfo, OperationQueue, QueueProvider};
use opqueue_common_telemetry::{init_global_logging, set_panic_hook};
use snafu::{ResultExt, Whatever};

mod build_info;

#[derive(Debug, Parser)]
#[clap(
name = "opqueue",
about = "Durable operation queue",
author = build_info::AUTHOR,
version = build_info::FULL_VERSION)]
struct Cli {
    /// TOML configuration file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Overrides `queue.base_dir` from the configuration.
    #[arg(long, global = true)]
    base_dir: Option<PathBuf>,

    #[command(subcommand)]
    commands: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    Add(AddArgs),
    Peek(BatchArgs),
    Remove(BatchArgs),
    Len(PartitionArgs),
    Drop(PartitionArgs),
    CheckConfig,
    Status,
}

#[derive(Debug, Clone, Args)]
struct PartitionArgs {
    #[arg(long)]
    channel: String,

    #[arg(long)]
    namespace: String,
}

impl PartitionArgs {
    fn open(&self, provider: &QueueProvider) -> Result<Arc<OperationQueue>, Whatever> {
        provider
            .create(&self.channel, &self.namespace)
            .with_whatever_context(|_| {
                format!("Failed to open queue {}/{}", self.channel, self.namespace)
            })
    }
}

#[derive(Debug, Clone, Args)]
#[command(long_about = r"

Appends one operation to a partition and prints the new queue size.
Examples:

opqueue add --channel mychannel --namespace did:sidetree --id EiA1 --data '{}'

")]
struct AddArgs {
    #[command(flatten)]
    partition: PartitionArgs,

    /// Unique suffix of the operation.
    #[arg(long)]
    id: String,

    /// Operation payload.
    #[arg(long, default_value = "")]
    data: String,
}

impl AddArgs {
    fn run(&self, provider: &QueueProvider) -> Result<(), Whatever> {
        let queue = self.partition.open(provider)?;
        let op = OperationInfo::new(
            self.id.as_str(),
            self.partition.namespace.as_str(),
            self.data.clone().into_bytes(),
        );
        let size = queue.add(&op).whatever_context("Failed to add operation")?;
        println!("{size}");
        Ok(())
    }
}

#[derive(Debug, Clone, Args)]
struct BatchArgs {
    #[command(flatten)]
    partition: PartitionArgs,

    /// Maximum number of operations.
    #[arg(long, default_value_t = 10)]
    max: u64,
}

impl BatchArgs {
    fn peek(&self, provider: &QueueProvider) -> Result<(), Whatever> {
        let queue = self.partition.open(provider)?;
        let ops = queue
            .peek(self.max)
            .whatever_context("Failed to peek operations")?;
        print_ops(&ops);
        Ok(())
    }

    fn remove(&self, provider: &QueueProvider) -> Result<(), Whatever> {
        let queue = self.partition.open(provider)?;
        let (ops, size) = queue
            .remove(self.max)
            .whatever_context("Failed to remove operations")?;
        print_ops(&ops);
        println!("remaining: {size}");
        Ok(())
    }
}

fn print_ops(ops: &[OperationInfo]) {
    for op in ops {
        println!(
            "{}\t{}\t{}",
            op.unique_suffix,
            op.namespace,
            String::from_utf8_lossy(&op.data)
        );
    }
}

fn check_config(config: &AppConfig) {
    println!("base_dir: {}", config.queue.base_dir.display());
    println!("persist: {:?}", config.queue.persist);
    match config.monitor_period() {
        Some(period) => println!("monitor: every {}s", period.as_secs()),
        None => println!("monitor: disabled"),
    }
    for channel in &config.channels {
        for ns in &channel.namespaces {
            println!("{}/{} -> {}", channel.channel_id, ns.namespace, ns.base_path);
        }
    }
}

fn status(config: AppConfig) -> Result<(), Whatever> {
    let app = config.open();
    app.start().whatever_context("Failed to start")?;
    for status in app.status() {
        println!(
            "{}\t{}\tlen={}\thead={}\ttail={}",
            status.partition.channel_id(),
            status.partition.namespace(),
            status.len,
            status.cursors.head,
            status.cursors.tail
        );
    }
    app.shutdown();
    Ok(())
}

fn main() -> Result<(), Whatever> {
    let cli = Cli::parse();

    let mut config =
        AppConfig::load(cli.config.as_deref()).whatever_context("Failed to load configuration")?;
    if let Some(base_dir) = cli.base_dir {
        config.queue.base_dir = base_dir;
    }

    let _guards = init_global_logging("opqueue", &config.logging);
    set_panic_hook();

    let provider = QueueProvider::new(config.queue_config());
    let result = match &cli.commands {
        Commands::Add(args) => args.run(&provider),
        Commands::Peek(args) => args.peek(&provider),
        Commands::Remove(args) => args.remove(&provider),
        Commands::Len(args) => args.open(&provider).map(|queue| println!("{}", queue.len())),
        Commands::Drop(args) => provider
            .drop_partition(&args.channel, &args.namespace)
            .whatever_context("Failed to drop partition"),
        Commands::CheckConfig => {
            check_config(&config);
            Ok(())
        }
        Commands::Status => status(config),
    };
    provider.close_all();
    result
}
