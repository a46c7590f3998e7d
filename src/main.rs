fn main() -> anyhow::Result<()> {
    contactd::cli::run_cli()
}
