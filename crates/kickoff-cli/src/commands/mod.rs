pub mod config;
pub mod console;
pub mod leaderboard;
pub mod remote;
pub mod serve;
pub mod timer;
pub mod watch;
