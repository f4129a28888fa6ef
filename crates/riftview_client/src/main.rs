mod app;
mod controls;
mod input;
mod renderer;
mod scene_builder;
mod settings;
mod shapes;

fn main() {
    app::run();
}
