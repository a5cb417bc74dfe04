use std::{
    fs::File,
    io::{
        BufWriter,
        Write,
    },
    path::PathBuf,
    time::Instant,
};

use clap::{
    Args,
    Parser,
    Subcommand,
    ValueHint,
};
use log::info;

use cfr::{
    cce_dist,
    games::kuhn::Kuhn,
    nash_conv,
    uniform_correlation_device,
    CfrConfig,
    CfrSolver,
    CorrDevBuilder,
};

#[derive(Parser)]
struct AppArgs {
    /// Number of players of Kuhn poker.
    #[clap(long, short, value_parser, default_value_t = 3)]
    players: usize,

    /// Chips each player puts in the pot before the cards are dealt.
    #[clap(long, short, value_parser, default_value_t = 1)]
    ante: i32,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run CFR and report NashConv of the average policy.
    Cfr(TrainingArgs),
    /// Run CFR and also report the CCE distance of the played policies.
    Cce(CceArgs),
}

#[derive(Args)]
struct TrainingArgs {
    #[clap(long, short, value_parser, default_value_t = 1000)]
    iterations: usize,

    #[clap(long, short, value_parser, default_value_t = 50)]
    report_every: usize,

    #[clap(long, short, value_parser, value_hint(ValueHint::FilePath))]
    log_path: Option<PathBuf>,

    #[clap(flatten)]
    config: CfrConfig,
}

#[derive(Args)]
struct CceArgs {
    #[clap(flatten)]
    training: TrainingArgs,

    /// Pure joint policies drawn from each iteration's current policy.
    #[clap(long, value_parser, default_value_t = 100)]
    samples_per_iteration: usize,

    /// Measure the device of sampled pure joint policies instead of the
    /// uniform device over current policies.
    #[clap(long)]
    sampled_device: bool,

    #[clap(long, value_parser, default_value_t = 42)]
    seed: u64,
}

fn open_log(path: &Option<PathBuf>, header: &str) -> std::io::Result<Option<BufWriter<File>>> {
    match path {
        Some(path) => {
            let mut w = BufWriter::new(File::create(path)?);
            writeln!(w, "{}", header)?;
            Ok(Some(w))
        }
        None => Ok(None),
    }
}

fn is_report_epoch(args: &TrainingArgs, i: usize) -> bool {
    i % args.report_every.max(1) == 0 || i + 1 == args.iterations
}

fn run_cfr(game: &Kuhn, args: &TrainingArgs) -> Result<(), Box<dyn std::error::Error>> {
    let mut log_writer = open_log(&args.log_path, "epoch,elapsed_seconds,nash_conv")?;
    let mut solver = CfrSolver::new(game, args.config)?;
    let start_t = Instant::now();
    for i in 0..args.iterations {
        solver.evaluate_and_update_policy();
        if is_report_epoch(args, i) {
            let conv = nash_conv(game, &solver.average_policy());
            info!("Iteration {:8} NashConv={}", i, conv);
            if let Some(w) = &mut log_writer {
                writeln!(w, "{},{},{:.12}", i, start_t.elapsed().as_secs(), conv)?;
                w.flush()?;
            }
        }
    }
    info!("Training has finished");
    solver.print_policy();
    Ok(())
}

fn run_cce(game: &Kuhn, args: &CceArgs) -> Result<(), Box<dyn std::error::Error>> {
    let training = &args.training;
    let mut log_writer = open_log(&training.log_path, "epoch,elapsed_seconds,cce_dist,nash_conv")?;
    let mut solver = CfrSolver::new(game, training.config)?;
    let mut cd_builder = CorrDevBuilder::new(args.seed);
    let mut policies = Vec::with_capacity(training.iterations);
    let start_t = Instant::now();
    for i in 0..training.iterations {
        solver.evaluate_and_update_policy();
        let current_policy = solver.tabular_current_policy();
        cd_builder.add_sampled_joint_policy(&current_policy, args.samples_per_iteration);
        policies.push(current_policy);

        if is_report_epoch(training, i) {
            let conv = nash_conv(game, &solver.average_policy());
            let device = if args.sampled_device {
                cd_builder.correlation_device()
            } else {
                uniform_correlation_device(&policies)
            };
            let cce_dist_info = cce_dist(game, &device)?;
            info!(
                "Iteration {:8} CCE dist={} NashConv={} ({} sampled joint policies)",
                i,
                cce_dist_info.dist_value,
                conv,
                cd_builder.num_policies()
            );
            if let Some(w) = &mut log_writer {
                writeln!(
                    w,
                    "{},{},{:.12},{:.12}",
                    i,
                    start_t.elapsed().as_secs(),
                    cce_dist_info.dist_value,
                    conv
                )?;
                w.flush()?;
            }
        }
    }
    info!("Training has finished");
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize env_logger with a default log level of INFO.
    env_logger::init_from_env(
        env_logger::Env::default().filter_or(env_logger::DEFAULT_FILTER_ENV, "info"),
    );

    let args = AppArgs::parse();
    let game = Kuhn::new(args.players, args.ante)?;
    info!("kuhn_poker(players={},ante_amount={})", args.players, args.ante);
    match &args.command {
        Command::Cfr(training_args) => run_cfr(&game, training_args),
        Command::Cce(cce_args) => run_cce(&game, cce_args),
    }
}
