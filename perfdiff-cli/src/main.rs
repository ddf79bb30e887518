fn main() -> anyhow::Result<()> {
    perfdiff_cli::run()
}
