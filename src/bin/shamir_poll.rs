use ark_std::{end_timer, start_timer};
use clap::Parser;
use rand::seq::IndexedRandom;
use shamir_poll::{Fp2203, PollConfig, PollSession};

#[derive(Parser, Debug)]
#[command(about = "Tally a poll among secret-sharing authorities", author, version)]
struct Cli {
    /// Number of tallying authorities (at least 2)
    #[arg(long = "authorities", default_value_t = 5)]
    authorities: usize,

    /// The question being asked
    #[arg(long = "question")]
    question: String,

    /// Options separated by semicolons, e.g. "Yes; No"
    #[arg(long = "options")]
    options: String,

    /// A ballot to cast (repeat flag for multiple)
    #[arg(long = "vote")]
    votes: Vec<String>,

    /// Number of additional uniformly random ballots
    #[arg(long = "random", default_value_t = 0)]
    random: usize,
}

fn main() {
    init_tracing();
    let cli = Cli::parse();

    let options: Vec<String> = cli
        .options
        .split(';')
        .map(str::trim)
        .filter(|option| !option.is_empty())
        .map(str::to_string)
        .collect();

    let mut ballots = cli.votes.clone();
    let mut rng = rand::rng();
    for _ in 0..cli.random {
        if let Some(choice) = options.choose(&mut rng) {
            ballots.push(choice.clone());
        }
    }

    let config = PollConfig::new(cli.authorities, options, cli.question);
    let mut poll = match PollSession::<Fp2203>::new(config) {
        Ok(poll) => poll,
        Err(e) => {
            eprintln!("Could not create poll: {e}");
            std::process::exit(1);
        }
    };

    let timer = start_timer!(|| format!("{} ballots", ballots.len()));
    for ballot in &ballots {
        if let Err(e) = poll.vote(ballot) {
            eprintln!("Ballot {ballot:?} not counted: {e}");
        }
    }
    end_timer!(timer);

    match poll.results() {
        Ok(results) => print!("{results}"),
        Err(e) => {
            eprintln!("Could not tally poll: {e}");
            std::process::exit(1);
        }
    }
}

fn init_tracing() {
    static INIT: std::sync::Once = std::sync::Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "info".into()),
            )
            .try_init();
    });
}
