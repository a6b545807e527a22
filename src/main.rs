use anyhow::Result;

fn main() -> Result<()> {
    codectx::cli::run()
}
