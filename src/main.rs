mod shaderlib;

use std::{env, fs, path::Path};

use anyhow::Context;
use glfw::Context as _;
use shadegraph::{opengl::GlCompiler, prelude::*, shader::Stage};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Print the sources generated for a graph document, no OpenGL context needed.
fn dump(path: &Path) -> anyhow::Result<()> {
    let json = fs::read_to_string(path).with_context(|| format!("Reading `{}`", path.display()))?;
    let mut graph = Graph::from_json(&json, &REGISTRY)?.validate()?;
    let source = graph.build()?;

    println!("// Vertex stage\n{}", source.numbered(Stage::Vertex));
    println!("// Fragment stage\n{}", source.numbered(Stage::Fragment));
    Ok(())
}

/// Compile every ready-made graph in a hidden window and bind a sample scene to it.
fn compile_shaderlib() -> anyhow::Result<()> {
    let mut glfw = glfw::init(glfw::FAIL_ON_ERRORS)
        .map_err(|error| anyhow::anyhow!("GLFW initialization failed: {error:?}"))?;
    glfw.window_hint(glfw::WindowHint::ContextVersion(3, 3));
    glfw.window_hint(glfw::WindowHint::OpenGlProfile(
        glfw::OpenGlProfileHint::Core,
    ));
    glfw.window_hint(glfw::WindowHint::Visible(false));

    let (mut window, _events) = glfw
        .create_window(256, 256, "shadegraph", glfw::WindowMode::Windowed)
        .context("Creating the OpenGL context")?;
    window.make_current();
    gl::load_with(|symbol| window.get_proc_address(symbol) as *const _);

    let mut scene = Scene::new(Camera::perspective([0., 1., 5.], 1., 1., 0.1, 100.));
    scene
        .add_light(Light::directional([0., -1., -1.], Color::WHITE, 1.))
        .add_light(Light::point([2., 2., 0.], Color::new(1., 0.8, 0.6), 2., 10.));
    let object = Object::default();
    let mesh = Mesh::default();

    for (name, graph) in shaderlib::shaderlib() {
        let mut graph = graph()?.validate()?;
        let mut program = graph.compile(&mut GlCompiler)?;

        program.bind();
        graph.bind(&scene, &object, &mesh, &mut program)?;

        tracing::info!(name, program = program.handle(), "Compiled and bound");
    }

    Ok(())
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    match env::args().nth(1) {
        Some(path) => dump(Path::new(&path)),
        None => compile_shaderlib(),
    }
}
