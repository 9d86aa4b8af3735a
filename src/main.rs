fn main() {
    #[cfg(feature = "cli")]
    oxirdiff::cli::run();

    #[cfg(not(feature = "cli"))]
    {
        eprintln!("oxirdiff: CLI not enabled. Rebuild with `--features cli`.");
        std::process::exit(1);
    }
}
