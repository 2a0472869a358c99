use clap::{Arg, arg, command};

pub const CLAP_STYLING: clap::builder::styling::Styles = clap::builder::styling::Styles::styled()
    .header(clap_cargo::style::HEADER)
    .usage(clap_cargo::style::USAGE)
    .literal(clap_cargo::style::LITERAL)
    .placeholder(clap_cargo::style::PLACEHOLDER)
    .error(clap_cargo::style::ERROR)
    .valid(clap_cargo::style::VALID)
    .invalid(clap_cargo::style::INVALID);

pub fn command_argument_builder() -> clap::Command {
    clap::Command::new("tilescout")
        .version(env!("CARGO_PKG_VERSION"))
        .bin_name("tilescout")
        .styles(CLAP_STYLING)
        .arg(arg!(-q --"quiet" "Suppress banner and non-essential output").required(false))
        .arg(
            arg!(-v --"verbose" "Show debug logs from discovery and pagination")
                .required(false)
                .global(true),
        )
        .subcommand_required(false)
        .subcommand(
            command!("scrape")
                .about(
                    "Discover listing pages under a start URL, load every product card and \
                export the records.",
                )
                .arg(url_arg())
                .arg(depth_arg())
                .arg(threads_arg())
                .arg(profile_arg())
                .arg(
                    arg!(-o --"output" <PATH>)
                        .required(false)
                        .help("Save records to file (default: print to screen)"),
                )
                .arg(
                    arg!(-f --"format" <FORMAT>)
                        .required(false)
                        .help("Output format: text, json, csv (default: from --output extension, else text)")
                        .value_parser(["text", "json", "csv"]),
                )
                .arg(
                    arg!(--"enrich")
                        .required(false)
                        .help("Visit product pages to fill in missing availability and specs")
                        .action(clap::ArgAction::SetTrue),
                )
                .arg(
                    arg!(--"max-steps" <STEPS>)
                        .required(false)
                        .help("Upper bound on 'load more' steps per listing page")
                        .value_parser(clap::value_parser!(usize))
                        .default_value("500"),
                )
                .arg(budget_arg())
                .args(browser_args()),
        )
        .subcommand(
            command!("discover")
                .about("List the listing pages under a start URL without extracting records")
                .arg(url_arg())
                .arg(depth_arg())
                .arg(threads_arg())
                .arg(profile_arg())
                .arg(budget_arg())
                .args(browser_args()),
        )
        .subcommand(
            command!("classify")
                .about("Check whether a single page is a product listing")
                .arg(url_arg())
                .arg(profile_arg())
                .args(browser_args()),
        )
}

fn url_arg() -> Arg {
    arg!(-u --"url" <URL>)
        .required(true)
        .help("Start URL: the category root, a category hub or a listing page")
}

fn depth_arg() -> Arg {
    arg!(-d --"depth" <DEPTH>)
        .required(false)
        .help("Maximum category discovery depth")
        .value_parser(clap::value_parser!(usize))
        .default_value("2")
}

fn threads_arg() -> Arg {
    arg!(-t --"threads" <NUM_WORKERS>)
        .required(false)
        .help("Number of browser pages working in parallel")
        .value_parser(clap::value_parser!(usize))
        .default_value("1")
}

fn profile_arg() -> Arg {
    arg!(-p --"profile" <PATH>)
        .required(false)
        .help("JSON site profile overriding hosts and selectors (default: public.gr)")
}

fn budget_arg() -> Arg {
    arg!(--"budget" <SECS>)
        .required(false)
        .help("Wall-clock budget for the whole run; work stops early and keeps what it has")
        .value_parser(clap::value_parser!(u64))
}

fn browser_args() -> Vec<Arg> {
    vec![
        arg!(--"headful")
            .required(false)
            .help("Show the browser window")
            .action(clap::ArgAction::SetTrue),
        arg!(--"remote" <URL>)
            .required(false)
            .help("Attach to a running Chrome DevTools endpoint instead of launching one"),
        arg!(--"timeout" <SECS>)
            .required(false)
            .help("Navigation timeout per page")
            .value_parser(clap::value_parser!(u64))
            .default_value("60"),
    ]
}
