use glam::Vec3;
use kiln::{Camera, EngineConfig, Error, MeshData, Transform};

fn main() {
    let config = match EngineConfig::load_or_default("engine.ron") {
        Ok(config) => config,
        Err(err) => {
            eprintln!("engine.ron: {err}");
            std::process::exit(1);
        }
    };
    config.init_logging();

    let result = kiln::run(
        config,
        |renderer| {
            renderer.set_camera(Some(
                Camera::new().at(2.0, 2.0, 4.0).looking_at(0.0, 0.0, 0.0),
            ));
            let cube = renderer.create_mesh(&MeshData::cube())?;
            let red = renderer
                .material("red")
                .ok_or_else(|| Error::InvalidUsage("material 'red' is not defined".into()))?;
            Ok((cube, red))
        },
        |&mut (cube, red), frame| {
            let spin =
                Transform::new().rotation(Vec3::new(frame.time * 20.0, frame.time * 45.0, 0.0));
            frame.renderer.draw_mesh(cube, spin, red);
        },
    );

    if result.is_err() {
        std::process::exit(1);
    }
}
