use clap::Parser;

fn main() {
    let cli = tpsdkctl::Cli::parse();
    tpsdkctl::init_tracing(cli.verbose);
    if let Err(err) = tpsdkctl::run(cli) {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
