mod common;

use common::recording::{Event, RecordingDevice, test_config};
use common::{bare_triangle, triangle};
use forward_core::{MeshError, Renderer, TextureData, TextureSlot};

fn command_buffers(device: &RecordingDevice) -> Vec<u32> {
    device
        .events()
        .into_iter()
        .filter_map(|e| match e {
            Event::AcquireCommandBuffer { cmd } => Some(cmd),
            _ => None,
        })
        .collect()
}

#[test]
fn mesh_upload_uses_one_submitted_command_buffer() {
    let device = RecordingDevice::new();
    let mut renderer = Renderer::new(&device, test_config(), 800, 600).unwrap();
    device.clear_events();

    renderer.create_mesh(&triangle(), "tri").unwrap();

    let cmds = command_buffers(&device);
    assert_eq!(cmds.len(), 1);
    let cmd = cmds[0];
    let copies = device.count(|e| {
        matches!(e, Event::CopyToBuffer { cmd: c, .. } | Event::CopyToTexture { cmd: c, .. } if *c == cmd)
    });
    // vertices, indices, three textures
    assert_eq!(copies, 5);
    assert_eq!(device.count(|e| *e == Event::Submit { cmd }), 1);
    assert_eq!(device.count(|e| matches!(e, Event::Cancel { .. })), 0);
}

#[test]
fn staging_buffers_are_released_after_recording() {
    let device = RecordingDevice::new();
    let mut renderer = Renderer::new(&device, test_config(), 800, 600).unwrap();
    let baseline = device.live_objects().len();

    renderer.create_mesh(&triangle(), "tri").unwrap();

    // 2 buffers, 3 textures, 1 sampler binding; no staging left behind
    assert_eq!(device.live_objects().len(), baseline + 6);
    let staged = device.count(|e| matches!(e, Event::CreateStaging { .. }));
    assert_eq!(staged, 5);
}

#[test]
fn texture_failure_rolls_back_the_whole_mesh() {
    let device = RecordingDevice::new();
    let mut renderer = Renderer::new(&device, test_config(), 800, 600).unwrap();
    let baseline = device.live_objects();
    device.clear_events();
    device.fail_textures_after(1);

    let err = renderer.create_mesh(&triangle(), "tri").unwrap_err();

    assert!(matches!(err, MeshError::Upload { ref name, .. } if name == "tri"));
    let cmd = command_buffers(&device)[0];
    assert_eq!(device.count(|e| *e == Event::Cancel { cmd }), 1);
    assert_eq!(device.count(|e| *e == Event::Submit { cmd }), 0);
    assert_eq!(device.live_objects(), baseline);
    assert_eq!(renderer.mesh_count(), 0);
    assert!(!renderer.contains_mesh("tri"));
}

#[test]
fn staging_failure_rolls_back_the_whole_mesh() {
    let device = RecordingDevice::new();
    let mut renderer = Renderer::new(&device, test_config(), 800, 600).unwrap();
    renderer.create_mesh(&triangle(), "first").unwrap();
    let baseline = device.live_objects();
    device.clear_events();
    device.fail_staging(true);

    let err = renderer.create_mesh(&triangle(), "second").unwrap_err();
    assert!(matches!(err, MeshError::Upload { .. }));
    assert_eq!(device.count(|e| matches!(e, Event::Cancel { .. })), 1);
    assert_eq!(device.live_objects(), baseline);
    assert_eq!(renderer.mesh_names(), vec!["first"]);

    device.fail_staging(false);
    renderer.create_mesh(&triangle(), "second").unwrap();
    assert_eq!(renderer.mesh_names(), vec!["first", "second"]);
}

#[test]
fn missing_textures_get_fallback_texels() {
    let device = RecordingDevice::new();
    let mut renderer = Renderer::new(&device, test_config(), 800, 600).unwrap();
    device.clear_events();

    renderer.create_mesh(&bare_triangle(), "bare").unwrap();

    let texels: Vec<(wgpu::TextureFormat, Vec<u8>)> = {
        let events = device.events();
        let format_of = |id: u32| {
            events.iter().find_map(|e| match e {
                Event::CreateTexture { id: t, format, .. } if *t == id => Some(*format),
                _ => None,
            })
        };
        events
            .iter()
            .filter_map(|e| match e {
                Event::CopyToTexture { dst, data, .. } => Some((format_of(*dst).unwrap(), data.clone())),
                _ => None,
            })
            .collect()
    };
    assert_eq!(
        texels,
        vec![
            (wgpu::TextureFormat::Rgba8UnormSrgb, vec![255, 255, 255, 255]),
            (wgpu::TextureFormat::Rgba8Unorm, vec![127, 127, 255, 255]),
            (wgpu::TextureFormat::Rgba8Unorm, vec![255, 255, 0, 255]),
        ]
    );
}

#[test]
fn texture_rows_are_padded_to_the_device_pitch() {
    let device = RecordingDevice::with_row_alignment(256);
    let mut renderer = Renderer::new(&device, test_config(), 800, 600).unwrap();
    device.clear_events();

    let albedo = TextureData::new(vec![200; 3 * 2 * 4], 3, 2);
    let mesh = bare_triangle().with_texture(TextureSlot::Albedo, albedo);
    renderer.create_mesh(&mesh, "padded").unwrap();

    let (bytes_per_row, data) = device
        .events()
        .into_iter()
        .find_map(|e| match e {
            Event::CopyToTexture {
                bytes_per_row,
                data,
                region,
                ..
            } if region.width == 3 => Some((bytes_per_row, data)),
            _ => None,
        })
        .unwrap();
    assert_eq!(bytes_per_row, 256);
    assert_eq!(data.len(), 512);
    assert!(data[..12].iter().all(|&b| b == 200));
    assert!(data[12..256].iter().all(|&b| b == 0));
    assert!(data[256..268].iter().all(|&b| b == 200));
}

#[test]
fn texture_with_wrong_pixel_count_is_rejected() {
    let device = RecordingDevice::new();
    let mut renderer = Renderer::new(&device, test_config(), 800, 600).unwrap();
    let baseline = device.live_objects();

    let mesh = bare_triangle().with_texture(TextureSlot::Normal, TextureData::new(vec![0; 5], 2, 2));
    assert!(renderer.create_mesh(&mesh, "broken").is_err());
    assert_eq!(device.live_objects(), baseline);
    assert_eq!(renderer.mesh_count(), 0);
}

#[test]
fn vertex_layout_follows_the_tangent_feature() {
    let vertex_buffer_size = |tangents: bool| {
        let device = RecordingDevice::new();
        let mut config = test_config();
        config.features.tangents = tangents;
        let mut renderer = Renderer::new(&device, config, 800, 600).unwrap();
        device.clear_events();
        renderer.create_mesh(&triangle(), "tri").unwrap();
        device
            .events()
            .into_iter()
            .find_map(|e| match e {
                Event::CreateBuffer {
                    usage: forward_core::device::BufferUsage::Vertex,
                    size,
                    ..
                } => Some(size),
                _ => None,
            })
            .unwrap()
    };

    assert_eq!(vertex_buffer_size(true), 3 * 44);
    assert_eq!(vertex_buffer_size(false), 3 * 32);
}
