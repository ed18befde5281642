use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(version, author, about)]
/// Backend server for sport-bets.
pub struct Config {
    #[clap(long, env = "DATABASE_URL")]
    /// Postgres connection string, keeps everything in memory when absent
    pub pg_url: Option<String>,
    #[clap(default_value = "0.0.0.0", long)]
    /// Bind address for sport-bets' webserver
    pub bind: String,
    #[clap(default_value_t = 3000, long)]
    /// Port for sport-bets' webserver
    pub port: u16,
    #[clap(long, env = "JWT_SECRET", hide_env_values = true)]
    /// Secret used to sign access tokens
    pub jwt_secret: String,
    #[clap(default_value_t = 30, long)]
    /// Lifetime of an access token in minutes
    pub token_expire_minutes: i64,
}
