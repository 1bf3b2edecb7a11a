use clap::{Arg, ArgAction, Command, value_parser};

pub fn build_cli() -> Command {
    Command::new("obserra")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Monitor services from the terminal")
        .long_about("Obserra shows the health, resource usage and logs of the services registered with an Obserra backend. Configuration is read from ~/.obserra/config.toml and ./.obserra/config.toml; OBSERRA_ENDPOINT and the flags below override it.")
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Enable verbose logging output")
                .action(ArgAction::SetTrue)
                .global(true),
        )
        .arg(
            Arg::new("endpoint")
                .long("endpoint")
                .short('e')
                .help("GraphQL endpoint URL (overrides config and OBSERRA_ENDPOINT)")
                .global(true),
        )
        .arg(
            Arg::new("timeout-ms")
                .long("timeout-ms")
                .help("Overall timeout per request in milliseconds")
                .value_parser(value_parser!(u64).range(1..))
                .global(true),
        )
        .arg(
            Arg::new("retries")
                .long("retries")
                .help("Retries after a failed request")
                .value_parser(value_parser!(u32))
                .global(true),
        )
        .arg(
            Arg::new("retry-delay-ms")
                .long("retry-delay-ms")
                .help("Delay between retries in milliseconds")
                .value_parser(value_parser!(u64))
                .global(true),
        )
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            Command::new("services")
                .about("List monitored services")
                .arg(
                    Arg::new("json")
                        .long("json")
                        .help("Output in JSON format")
                        .action(ArgAction::SetTrue)
                        .conflicts_with("watch"),
                )
                .arg(
                    Arg::new("watch")
                        .long("watch")
                        .short('w')
                        .help("Keep the list on screen and refresh it periodically")
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("interval-ms")
                        .long("interval-ms")
                        .help("Refresh interval for --watch (overrides config, default: 10000)")
                        .value_parser(value_parser!(u64).range(1..))
                        .requires("watch"),
                ),
        )
        .subcommand(
            Command::new("service")
                .about("Show health and metrics of one service")
                .arg(
                    Arg::new("id")
                        .help("Service id")
                        .required(true)
                        .index(1),
                )
                .arg(
                    Arg::new("json")
                        .long("json")
                        .help("Output in JSON format")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(
            Command::new("logs")
                .about("Show recent logs of a service")
                .arg(
                    Arg::new("id")
                        .help("Service id")
                        .required(true)
                        .index(1),
                )
                .arg(
                    Arg::new("limit")
                        .long("limit")
                        .short('n')
                        .help("Number of log lines to fetch")
                        .value_parser(value_parser!(u32)),
                )
                .arg(
                    Arg::new("follow")
                        .long("follow")
                        .short('f')
                        .help("Stream new log lines as they arrive")
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("json")
                        .long("json")
                        .help("Print each log entry as a JSON line")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(
            Command::new("restart")
                .about("Restart a service")
                .arg(
                    Arg::new("id")
                        .help("Service id")
                        .required(true)
                        .index(1),
                ),
        )
        .subcommand(
            Command::new("completions")
                .about("Generate shell completions")
                .arg(
                    Arg::new("shell")
                        .help("Shell to generate completions for")
                        .required(true)
                        .index(1)
                        .value_parser(value_parser!(clap_complete::Shell)),
                ),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_build() {
        build_cli().debug_assert();
    }

    #[test]
    fn test_global_overrides_after_subcommand() {
        let matches = build_cli()
            .try_get_matches_from([
                "obserra",
                "services",
                "--endpoint",
                "http://obserra.internal:5000/graphql",
                "--retries",
                "0",
            ])
            .unwrap();

        let (_, sub) = matches.subcommand().unwrap();
        assert_eq!(
            sub.get_one::<String>("endpoint").map(String::as_str),
            Some("http://obserra.internal:5000/graphql")
        );
        assert_eq!(sub.get_one::<u32>("retries"), Some(&0));
    }

    #[test]
    fn test_json_conflicts_with_watch() {
        let result = build_cli().try_get_matches_from(["obserra", "services", "--json", "--watch"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_interval_requires_watch() {
        let result =
            build_cli().try_get_matches_from(["obserra", "services", "--interval-ms", "500"]);
        assert!(result.is_err());

        let matches = build_cli()
            .try_get_matches_from(["obserra", "services", "--watch", "--interval-ms", "500"])
            .unwrap();
        let sub = matches.subcommand_matches("services").unwrap();
        assert_eq!(sub.get_one::<u64>("interval-ms"), Some(&500));
    }

    #[test]
    fn test_logs_args() {
        let matches = build_cli()
            .try_get_matches_from(["obserra", "logs", "svc-1", "-n", "20", "--follow"])
            .unwrap();
        let sub = matches.subcommand_matches("logs").unwrap();

        assert_eq!(sub.get_one::<String>("id").map(String::as_str), Some("svc-1"));
        assert_eq!(sub.get_one::<u32>("limit"), Some(&20));
        assert!(sub.get_flag("follow"));
    }

    #[test]
    fn test_id_is_required() {
        assert!(build_cli().try_get_matches_from(["obserra", "restart"]).is_err());
    }
}
