use crate::CLAP_STYLING;
use clap::{arg, command};
use dagscope::handlers::DEFAULT_DATA_DIR;
use url::Url;

fn format_arg() -> clap::Arg {
    arg!(-f --"format" <FORMAT>)
        .required(false)
        .help("Output format: text, json, dot, html (default: from --output extension, else text)")
        .value_parser(["text", "json", "dot", "html"])
}

fn output_arg() -> clap::Arg {
    arg!(-o --"output" <PATH>)
        .required(false)
        .help("Write the rendering to a file (default: display to screen)")
        .value_parser(clap::value_parser!(std::path::PathBuf))
}

fn traversal_args(cmd: clap::Command) -> clap::Command {
    cmd.arg(
        arg!(--"gateway" <URL>)
            .required(false)
            .help("IPFS gateway serving DAG-JSON/DAG-CBOR blocks")
            .value_parser(clap::value_parser!(Url)),
    )
    .arg(
        arg!(-d --"depth" <LEVELS>)
            .required(false)
            .help("Maximum accept/reject hops expanded from each root header")
            .value_parser(clap::value_parser!(usize)),
    )
    .arg(
        arg!(-c --"concurrency" <NUM_FETCHES>)
            .required(false)
            .help("Maximum number of block fetches in flight at once")
            .value_parser(clap::value_parser!(usize))
            .default_value("16"),
    )
    .arg(
        arg!(--"timeout" <SECONDS>)
            .required(false)
            .help("Request timeout in seconds (0 disables the timeout)")
            .value_parser(clap::value_parser!(u64))
            .default_value("30"),
    )
    .arg(output_arg())
    .arg(format_arg())
}

pub(crate) fn command_argument_builder() -> clap::Command {
    clap::Command::new("dagscope")
        .version(env!("CARGO_PKG_VERSION"))
        .bin_name("dagscope")
        .styles(CLAP_STYLING)
        .arg(arg!(-q --"quiet" "Suppress banner and non-essential output").required(false))
        .arg(
            arg!(-v --"verbose" ... "Increase log verbosity (-v info, -vv debug, -vvv trace)")
                .required(false)
                .global(true),
        )
        .arg(
            arg!(--"data-dir" <PATH>)
                .required(false)
                .help("Directory holding the dagscope database")
                .default_value(DEFAULT_DATA_DIR)
                .global(true),
        )
        .subcommand_required(false)
        .subcommand(
            command!("init")
                .about("Initializes the dagscope database on your filesystem")
                .arg(
                    arg!([PATH])
                        .required(false)
                        .help("Location to store the dagscope database (default: --data-dir)"),
                )
                .arg(
                    arg!(-f - -"force")
                        .help(
                            "Forces the overwriting of any existing database at the specified \
                        location.",
                        )
                        .required(false),
                ),
        )
        .subcommand(
            command!("config")
                .about("Show or change stored explorer settings")
                .subcommand_required(true)
                .subcommand(command!("list").about("List every setting with its effective value"))
                .subcommand(
                    command!("get")
                        .about("Print the effective value of a setting")
                        .arg(arg!(<KEY>).help("Setting name, e.g. scriptAddress or script-address")),
                )
                .subcommand(
                    command!("set")
                        .about("Store a setting")
                        .arg(arg!(<KEY>).help("Setting name, e.g. levelLimit or level-limit"))
                        .arg(arg!(<VALUE>).help("New value (an empty string clears filterToken)")),
                )
                .subcommand(
                    command!("unset")
                        .about("Remove a stored setting, reverting it to its default")
                        .arg(arg!(<KEY>).help("Setting name")),
                ),
        )
        .subcommand(traversal_args(
            command!("graph")
                .about(
                    "List UTxOs at the script address, follow each datum's header chain through \
                the gateway and render the resulting block graph.",
                )
                .arg(
                    arg!(-a --"address" <ADDRESS>)
                        .required(false)
                        .help("Script address whose UTxOs anchor the graph"),
                )
                .arg(
                    arg!(--"filter" <UNIT>)
                        .required(false)
                        .help("Keep only UTxOs holding this asset unit (empty keeps all)"),
                )
                .arg(
                    arg!(--"blockfrost-url" <URL>)
                        .required(false)
                        .help("Blockfrost API base URL")
                        .value_parser(clap::value_parser!(Url)),
                )
                .arg(
                    arg!(-t --"token" <PROJECT_ID>)
                        .required(false)
                        .help("Blockfrost project token"),
                ),
        ))
        .subcommand(traversal_args(
            command!("explore")
                .about("Print the explorer URL for a node id, optionally walking the chain behind a header")
                .arg(arg!(<ID>).help("Header/body CID or <tx_hash>#<index>"))
                .arg(
                    arg!(-w --"walk")
                        .required(false)
                        .help("Fetch the header and materialize the chain behind it")
                        .action(clap::ArgAction::SetTrue),
                ),
        ))
        .subcommand(
            command!("sessions").about("List recorded graph sessions").arg(
                arg!(-n --"limit" <COUNT>)
                    .required(false)
                    .help("Number of sessions to show")
                    .value_parser(clap::value_parser!(usize))
                    .default_value("20"),
            ),
        )
}
