// main.rs - 入口：窗口、渲染器、后台加载与事件循环

#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")] // 在 Release 模式下隐藏控制台窗口

mod camera;
mod config;
mod environment;
mod error;
mod gpu_model;
mod input;
mod interaction;
mod loader;
mod loading;
mod model;
mod render_loop;
mod renderer;
mod ui;
mod view_state;
mod viewer;

use camera::DragMode;
use clap::Parser;
use config::{Cli, ViewerConfig};
use input::Shortcuts;
use loader::LoadEvent;
use render_loop::FrameClock;
use renderer::Renderer;
use viewer::ViewerState;

use winit::{
    dpi::{LogicalSize, PhysicalPosition},
    event::*,
    event_loop::{ControlFlow, EventLoop},
    window::WindowBuilder,
};

use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Arc;
use std::time::Instant;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(e) = run() {
        log::error!("{e}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), error::ViewerError> {
    let cli = Cli::parse();
    let config = ViewerConfig::resolve(&cli)?;

    let event_loop = EventLoop::new();
    let window = Arc::new(
        WindowBuilder::new()
            .with_title(&config.window.title)
            .with_inner_size(LogicalSize::new(config.window.width, config.window.height))
            .build(&event_loop)?,
    );

    let mut renderer = pollster::block_on(Renderer::new(window.clone(), &config.post))?;
    let size = window.inner_size();
    let mut viewer = ViewerState::new(&config, size.width, size.height, Instant::now());
    let shortcuts = Shortcuts::from_config(&config.keys);

    // 交互状态
    let mut cursor = PhysicalPosition::new(0.0f64, 0.0f64);
    let mut clock = FrameClock::new(Instant::now());

    // 两个资源并行加载，互不等待
    let (tx, rx): (Sender<LoadEvent>, Receiver<LoadEvent>) = channel();
    loader::spawn_environment_load(config.environment_path.clone(), tx.clone());
    loader::spawn_model_load(config.model_path.clone(), tx);

    event_loop.run(move |event, _, control_flow| {
        *control_flow = ControlFlow::Poll;

        while let Ok(load_event) = rx.try_recv() {
            handle_load_event(load_event, &mut viewer, &mut renderer);
        }

        match event {
            Event::WindowEvent { event, .. } => {
                // 先让 egui 处理事件
                let response = renderer.egui_state.on_event(&renderer.egui_ctx, &event);
                if response.consumed {
                    return;
                }

                match event {
                    WindowEvent::CloseRequested => {
                        *control_flow = ControlFlow::Exit;
                    }

                    WindowEvent::Resized(new_size) => {
                        viewer.resize(new_size.width, new_size.height);
                        renderer.resize(new_size);
                    }

                    WindowEvent::ScaleFactorChanged { new_inner_size, .. } => {
                        viewer.resize(new_inner_size.width, new_inner_size.height);
                        renderer.resize(*new_inner_size);
                    }

                    // 键盘快捷键
                    WindowEvent::KeyboardInput { input, .. } => {
                        if input.state == ElementState::Pressed {
                            if let Some(action) =
                                input.virtual_keycode.and_then(|k| shortcuts.action_for(k))
                            {
                                viewer.apply(action);
                            }
                        }
                    }

                    // 鼠标交互：左键旋转，右键平移
                    WindowEvent::MouseInput { state, button, .. } => {
                        let mode = match button {
                            MouseButton::Left => DragMode::Rotate,
                            MouseButton::Right => DragMode::Pan,
                            _ => return,
                        };
                        if state == ElementState::Pressed {
                            viewer.begin_drag(mode, cursor.x as f32, cursor.y as f32);
                        } else {
                            viewer.end_drag(mode);
                        }
                    }

                    WindowEvent::CursorMoved { position, .. } => {
                        cursor = position;
                        viewer.pointer_moved(position.x as f32, position.y as f32);
                    }

                    WindowEvent::MouseWheel { delta, .. } => {
                        let scroll = match delta {
                            MouseScrollDelta::LineDelta(_, y) => y,
                            MouseScrollDelta::PixelDelta(pos) => pos.y as f32 / 20.0,
                        };
                        viewer.zoom(scroll);
                    }

                    _ => {}
                }
            }

            Event::RedrawRequested(_) => {
                let now = Instant::now();
                let dt = clock.tick(now);
                viewer.update(dt);
                viewer.check_load_timeout(now);
                renderer.update_scene(&viewer.scene_frame());

                let loading_text = viewer.loading_text();
                let frame = ui::UiFrame {
                    state: viewer.view_state(),
                    loading_text: loading_text.as_deref(),
                    fps: clock.fps(),
                };
                let mut actions = Vec::new();
                let render_result = renderer.render_with_ui(&window, |ctx| {
                    actions = ui::draw_ui(ctx, &frame);
                });

                for action in actions {
                    viewer.apply(action);
                }

                match render_result {
                    Ok(_) => {}
                    Err(wgpu::SurfaceError::Lost) => renderer.reconfigure(),
                    Err(wgpu::SurfaceError::OutOfMemory) => *control_flow = ControlFlow::Exit,
                    Err(e) => log::warn!("render error: {e:?}"),
                }
            }

            Event::MainEventsCleared => {
                window.request_redraw();
            }

            _ => {}
        }
    });
}

fn handle_load_event(event: LoadEvent, viewer: &mut ViewerState, renderer: &mut Renderer) {
    let opened = match event {
        LoadEvent::Progress { task, loaded, total } => {
            viewer.report_progress(task, loaded, total);
            false
        }
        LoadEvent::Environment(env) => {
            log::info!(
                "environment map ready: {}x{}, {} mip levels",
                env.width(),
                env.height(),
                env.levels.len()
            );
            renderer.set_environment(&env);
            viewer.environment_loaded()
        }
        LoadEvent::Model(model) => {
            log::info!(
                "model ready: {} meshes, {} triangles",
                model.meshes.len(),
                model.triangle_count()
            );
            renderer.set_model(&model);
            viewer.model_loaded()
        }
        LoadEvent::Failed { task, error } => {
            log::error!("failed to load {task}: {error}");
            false
        }
    };
    if opened {
        log::info!("all assets loaded");
    }
}
