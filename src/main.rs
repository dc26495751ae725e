fn main() -> anyhow::Result<()> {
    vmkeeper::cli::run_cli()
}
