//! GPU buffer creation and readback.

use wgpu::{Buffer, BufferUsages, Device, Queue};

/// Upload data to a new GPU buffer.
pub fn create_buffer_init<T: bytemuck::Pod>(
    device: &Device,
    label: &str,
    data: &[T],
    usage: BufferUsages,
) -> Buffer {
    use wgpu::util::DeviceExt;

    device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some(label),
        contents: bytemuck::cast_slice(data),
        usage,
    })
}

/// Create an uninitialized buffer. Sizes are rounded up to 4 bytes and
/// never zero, so empty scenes still get bindable buffers.
pub fn create_buffer(device: &Device, label: &str, size: u64, usage: BufferUsages) -> Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some(label),
        size: size.max(4).next_multiple_of(4),
        usage,
        mapped_at_creation: false,
    })
}

/// Storage buffer sized for `count` elements of `T`.
pub fn create_storage<T>(device: &Device, label: &str, count: u64, extra: BufferUsages) -> Buffer {
    create_buffer(
        device,
        label,
        count * std::mem::size_of::<T>() as u64,
        BufferUsages::STORAGE | extra,
    )
}

/// Map a `MAP_READ` buffer whose copy has already been submitted and read
/// `count` elements from its start.
pub async fn map_read<T: bytemuck::Pod>(
    device: &Device,
    buffer: &Buffer,
    count: usize,
) -> Result<Vec<T>, String> {
    let bytes = (count * std::mem::size_of::<T>()) as u64;
    let slice = buffer.slice(..bytes.max(4));

    let (tx, rx) = futures::channel::oneshot::channel();
    slice.map_async(wgpu::MapMode::Read, move |result| {
        tx.send(result).ok();
    });
    device.poll(wgpu::Maintain::Wait);

    rx.await
        .map_err(|_| "Channel closed".to_string())?
        .map_err(|e| format!("Buffer mapping failed: {:?}", e))?;

    let data = slice.get_mapped_range();
    let result: Vec<T> = bytemuck::cast_slice(&data[..bytes as usize]).to_vec();
    drop(data);
    buffer.unmap();

    Ok(result)
}

/// Copy `count` elements out of any `COPY_SRC` buffer.
pub async fn read_buffer<T: bytemuck::Pod>(
    device: &Device,
    queue: &Queue,
    buffer: &Buffer,
    count: usize,
) -> Result<Vec<T>, String> {
    let bytes = (count * std::mem::size_of::<T>()) as u64;
    let staging = create_buffer(
        device,
        "Staging Buffer",
        bytes,
        BufferUsages::MAP_READ | BufferUsages::COPY_DST,
    );

    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("Readback Encoder"),
    });
    if bytes > 0 {
        encoder.copy_buffer_to_buffer(buffer, 0, &staging, 0, bytes);
    }
    queue.submit(Some(encoder.finish()));

    map_read(device, &staging, count).await
}

/// Blocking wrapper for [`read_buffer`].
pub fn read_buffer_blocking<T: bytemuck::Pod>(
    device: &Device,
    queue: &Queue,
    buffer: &Buffer,
    count: usize,
) -> Result<Vec<T>, String> {
    pollster::block_on(read_buffer(device, queue, buffer, count))
}

/// Blocking wrapper for [`map_read`].
pub fn map_read_blocking<T: bytemuck::Pod>(
    device: &Device,
    buffer: &Buffer,
    count: usize,
) -> Result<Vec<T>, String> {
    pollster::block_on(map_read(device, buffer, count))
}

/// Workgroup counts for a 1D launch of `items` invocations.
///
/// Dispatch dimensions are capped at 65535, so large launches spill into
/// `y`; shaders rebuild the flat index from `num_workgroups`.
pub fn dispatch_size(items: u32, workgroup_size: u32) -> (u32, u32) {
    const MAX_DIM: u32 = 65_535;
    let groups = items.div_ceil(workgroup_size).max(1);
    if groups <= MAX_DIM {
        (groups, 1)
    } else {
        (MAX_DIM, groups.div_ceil(MAX_DIM))
    }
}
