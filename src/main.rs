use {
    clap::Parser,
    hike::{trail::TrailMap, Args, RunQuestions},
};

fn main() {
    TrailMap::run(&Args::parse());
}
