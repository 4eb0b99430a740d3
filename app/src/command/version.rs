/// Strategy for displaying version information.
///
/// Prints the `alice` version together with the session stores this build
/// can talk to.
#[derive(Debug, Clone, Copy)]
pub struct VersionStrategy;

impl super::CommandStrategy for VersionStrategy {
    type Input = ();

    async fn execute(&self, _input: Self::Input) -> anyhow::Result<()> {
        println!("{}", banner());
        Ok(())
    }
}

fn banner() -> String {
    let stores = if cfg!(feature = "redis-backend") {
        "memory, redis"
    } else {
        "memory"
    };
    format!(
        "alice {} (Bank of Kigali banking assistant)\nsession stores: {stores}",
        env!("CARGO_PKG_VERSION")
    )
}
