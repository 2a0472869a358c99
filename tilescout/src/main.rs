use colored::Colorize;
use tilescout::commands::command_argument_builder;
use tilescout::handlers::{
    handle_classify, handle_discover, handle_scrape, init_tracing, print_banner,
};

#[tokio::main]
async fn main() {
    let chosen_command = command_argument_builder().get_matches();
    let quiet = chosen_command.get_flag("quiet");
    let verbose = chosen_command.get_flag("verbose");

    // Show banner unless --quiet flag is set
    if !quiet {
        print_banner();
    }

    if chosen_command.subcommand().is_none() {
        return;
    }

    init_tracing(verbose);

    let result = match chosen_command.subcommand() {
        Some(("scrape", sub_matches)) => handle_scrape(sub_matches).await,
        Some(("discover", sub_matches)) => handle_discover(sub_matches).await,
        Some(("classify", sub_matches)) => handle_classify(sub_matches).await,
        _ => unreachable!("clap should ensure we don't get here"),
    };

    if let Err(e) = result {
        eprintln!("{} {:#}", "✗".red().bold(), e);
        std::process::exit(1);
    }
}
