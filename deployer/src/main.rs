use clap::{Args, Parser, Subcommand};
use cloud::AwsConfig;
use deployer::{
    silent_logger, stdout_logger, DeployError, Deployer, DeploymentConfig, DeploymentParameters,
    StatusQuery, Tier,
};
use std::path::PathBuf;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "deployer")]
#[command(about = "Publish a code package to an AWS Elastic Beanstalk environment")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload the package, register the version and create or update the environment
    Deploy {
        #[command(flatten)]
        config: ConfigArgs,
        /// Suppress status lines
        #[arg(short, long)]
        quiet: bool,
    },
    /// Print the derived deployment parameters without contacting AWS
    Plan {
        #[command(flatten)]
        config: ConfigArgs,
    },
    /// Show the bucket, application version and environment as AWS reports them;
    /// needs no solution stack or template
    Status {
        #[command(flatten)]
        config: ConfigArgs,
    },
}

#[derive(Args)]
struct ConfigArgs {
    /// TOML or JSON config file; flags below override its values
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Elastic Beanstalk application name
    #[arg(long)]
    app_name: Option<String>,
    /// Environment name; when omitted, deployer derives <app-name>-env as a convenience
    #[arg(long)]
    env_name: Option<String>,
    /// Description for the version and environment
    #[arg(long)]
    description: Option<String>,
    /// Version label (defaults to 1.0.0)
    #[arg(long = "version")]
    version: Option<String>,
    /// Path to the code package to upload
    #[arg(long)]
    code_package: Option<PathBuf>,
    /// S3 bucket (defaults to the lower-cased app name)
    #[arg(long)]
    bucket: Option<String>,
    /// Solution stack name; conflicts with --template
    #[arg(long)]
    solution_stack: Option<String>,
    /// Saved configuration template; conflicts with --solution-stack
    #[arg(long)]
    template: Option<String>,
    /// WebServer or Worker
    #[arg(long)]
    tier: Option<Tier>,
    /// AWS region
    #[arg(long)]
    region: Option<String>,
    /// Named credential profile
    #[arg(long)]
    profile: Option<String>,
    /// Alternative AWS endpoint, e.g. http://localhost:4566
    #[arg(long)]
    endpoint_url: Option<String>,
}

impl ConfigArgs {
    fn into_config(self) -> Result<DeploymentConfig, DeployError> {
        let mut config = match &self.config {
            Some(path) => DeploymentConfig::from_file(path)?,
            None => {
                let app_name = self.app_name.clone().ok_or_else(|| {
                    DeployError::invalid_config("--app-name is required without --config")
                })?;
                let code_package = self.code_package.clone().ok_or_else(|| {
                    DeployError::invalid_config("--code-package is required without --config")
                })?;
                DeploymentConfig::new(app_name, code_package)
            }
        };

        if let Some(app_name) = self.app_name {
            config.app_name = app_name;
        }
        if let Some(code_package) = self.code_package {
            config.code_package = code_package;
        }
        config.env_name = self.env_name.or(config.env_name);
        config.description = self.description.or(config.description);
        config.version = self.version.or(config.version);
        config.s3_bucket = self.bucket.or(config.s3_bucket);
        config.solution_stack = self.solution_stack.or(config.solution_stack);
        config.template = self.template.or(config.template);
        if let Some(tier) = self.tier {
            config.tier = tier;
        }

        let overrides = AwsConfig {
            region: self.region,
            profile: self.profile,
            endpoint_url: self.endpoint_url,
            ..AwsConfig::default()
        };
        config.aws = config.aws.merge(overrides);

        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Deploy { config, quiet } => {
            run_deploy(config.into_config()?, quiet).await?;
        }
        Commands::Plan { config } => {
            print_plan(config.into_config()?)?;
        }
        Commands::Status { config } => {
            show_status(config.into_config()?).await?;
        }
    }

    Ok(())
}

async fn run_deploy(
    config: DeploymentConfig,
    quiet: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let logger = if quiet { silent_logger() } else { stdout_logger() };
    let deployer = Deployer::connect(config).await?.with_logger(logger);

    match deployer.deploy().await {
        Ok(outcome) => {
            info!("Deployment finished");
            println!();
            println!("✓ Deployment submitted");
            println!(
                "  Package:     s3://{}/{} ({} bytes)",
                outcome.upload.bucket, outcome.upload.key, outcome.upload.size
            );
            println!("  Bucket:      {:?}", outcome.bucket);
            println!("  Version:     {:?}", outcome.application_version);
            println!(
                "  Environment: {} ({:?}, now {})",
                outcome.environment.environment_name,
                outcome.environment_action,
                outcome.environment.status
            );
            if let Some(cname) = &outcome.environment.cname {
                println!("  CNAME:       {}", cname);
            }
            Ok(())
        }
        Err(e) => {
            error!("Deployment failed: {}", e);
            Err(e.into())
        }
    }
}

fn print_plan(config: DeploymentConfig) -> Result<(), Box<dyn std::error::Error>> {
    let params = DeploymentParameters::from_config(&config)?;
    println!("{}", serde_json::to_string_pretty(&params)?);
    Ok(())
}

async fn show_status(config: DeploymentConfig) -> Result<(), Box<dyn std::error::Error>> {
    let query = StatusQuery::connect(&config).await?;
    let keys = query.keys();
    let status = query.run().await?;

    println!(
        "Bucket \"{}\": {}",
        keys.bucket,
        if status.bucket_exists { "present" } else { "absent" }
    );

    match &status.application_version {
        Some(version) => println!(
            "Application \"{}\" version \"{}\": registered ({})",
            keys.application_name,
            version.version_label,
            version.status.as_deref().unwrap_or("unknown status")
        ),
        None => println!(
            "Application \"{}\" version \"{}\": not registered",
            keys.application_name, keys.version_label
        ),
    }

    match &status.environment {
        Some(env) => println!(
            "Environment \"{}\": {} (version {})",
            env.environment_name,
            env.status,
            env.version_label.as_deref().unwrap_or("none")
        ),
        None => println!("Environment \"{}\": absent", keys.environment_name),
    }

    Ok(())
}
