//! Export of [`HostEngine`] through the C function table.

use crate::engine::HostEngine;
use std::os::raw::c_void;
use tensorbridge_core::ffi::{
    TB_MAX_RANK, TbAttr, TbNativeApi, TbOutput, read_attrs, slice_from_raw, write_truncated,
};
use tensorbridge_core::{NativeEngine, NativeError, NativeStatus, NativeToken, NativeType};

struct HostContext {
    engine: HostEngine,
    last_error: String,
}

impl HostEngine {
    /// Move the engine behind a C function table.
    ///
    /// The table owns the engine; its `destroy` entry frees it.
    pub fn into_c_api(self) -> TbNativeApi {
        let ctx = Box::new(HostContext {
            engine: self,
            last_error: String::new(),
        });
        TbNativeApi {
            ctx: Box::into_raw(ctx).cast::<c_void>(),
            version: tb_version,
            allocate: tb_allocate,
            bind_bytes: tb_bind_bytes,
            byte_len: tb_byte_len,
            read_bytes: tb_read_bytes,
            execute: tb_execute,
            release: tb_release,
            device_name: tb_device_name,
            copy_to_host: tb_copy_to_host,
            last_error: tb_last_error,
            destroy: tb_destroy,
        }
    }
}

/// # Safety
/// `ctx` must come from [`HostEngine::into_c_api`] and not be destroyed.
unsafe fn context<'a>(ctx: *mut c_void) -> &'a mut HostContext {
    unsafe { &mut *ctx.cast::<HostContext>() }
}

fn status(ctx: &mut HostContext, result: Result<(), NativeError>) -> i32 {
    match result {
        Ok(()) => NativeStatus::OK.0,
        Err(err) => {
            ctx.last_error = err.message;
            err.status.0
        }
    }
}

unsafe extern "C" fn tb_version(ctx: *mut c_void, buf: *mut u8, cap: usize) -> usize {
    let ctx = unsafe { context(ctx) };
    let version = ctx.engine.version();
    unsafe { write_truncated(version.as_bytes(), buf, cap) }
}

unsafe extern "C" fn tb_allocate(
    ctx: *mut c_void,
    dims: *const u64,
    rank: usize,
    dtype: i32,
    out_token: *mut u64,
) -> i32 {
    let ctx = unsafe { context(ctx) };
    let shape: Vec<usize> = unsafe { slice_from_raw(dims, rank) }
        .iter()
        .map(|&d| d as usize)
        .collect();
    let result = ctx
        .engine
        .allocate(&shape, NativeType(dtype))
        .map(|token| unsafe { *out_token = token.0 });
    status(ctx, result)
}

unsafe extern "C" fn tb_bind_bytes(ctx: *mut c_void, token: u64, data: *const u8, len: usize) -> i32 {
    let ctx = unsafe { context(ctx) };
    let bytes = unsafe { slice_from_raw(data, len) };
    let result = ctx.engine.bind_bytes(NativeToken(token), bytes);
    status(ctx, result)
}

unsafe extern "C" fn tb_byte_len(ctx: *mut c_void, token: u64, out_len: *mut usize) -> i32 {
    let ctx = unsafe { context(ctx) };
    let result = ctx
        .engine
        .byte_len(NativeToken(token))
        .map(|len| unsafe { *out_len = len });
    status(ctx, result)
}

unsafe extern "C" fn tb_read_bytes(ctx: *mut c_void, token: u64, out: *mut u8, len: usize) -> i32 {
    let ctx = unsafe { context(ctx) };
    let result = ctx.engine.read_bytes(NativeToken(token)).and_then(|bytes| {
        if bytes.len() != len {
            return Err(NativeError::invalid_argument(format!(
                "Read buffer of {len} bytes for a tensor of {} bytes",
                bytes.len()
            )));
        }
        unsafe { write_truncated(&bytes, out, len) };
        Ok(())
    });
    status(ctx, result)
}

unsafe extern "C" fn tb_execute(
    ctx: *mut c_void,
    name: *const u8,
    name_len: usize,
    attrs: *const TbAttr,
    num_attrs: usize,
    inputs: *const u64,
    num_inputs: usize,
    outputs: *mut TbOutput,
    output_cap: usize,
    num_outputs: *mut usize,
) -> i32 {
    let ctx = unsafe { context(ctx) };
    let name = match std::str::from_utf8(unsafe { slice_from_raw(name, name_len) }) {
        Ok(name) => name,
        Err(_) => {
            return status(ctx, Err(NativeError::invalid_argument("op name is not UTF-8")));
        }
    };
    let attrs = match unsafe { read_attrs(attrs, num_attrs) } {
        Ok(attrs) => attrs,
        Err(err) => return status(ctx, Err(err)),
    };
    let inputs: Vec<NativeToken> = unsafe { slice_from_raw(inputs, num_inputs) }
        .iter()
        .map(|&t| NativeToken(t))
        .collect();

    let results = match ctx.engine.execute_op(name, &attrs, &inputs) {
        Ok(results) => results,
        Err(err) => return status(ctx, Err(err)),
    };
    if let Some(rank) = results
        .iter()
        .map(|r| r.shape.len())
        .find(|&rank| rank > TB_MAX_RANK)
    {
        for result in &results {
            ctx.engine.release(result.token);
        }
        unsafe { *num_outputs = 0 };
        let err = NativeError::new(
            NativeStatus::UNIMPLEMENTED,
            format!(
                "{name} produced an output of rank {rank}; \
                 at most {TB_MAX_RANK} dimensions cross the table"
            ),
        );
        return status(ctx, Err(err));
    }

    unsafe { *num_outputs = results.len() };
    if results.len() > output_cap {
        for result in &results {
            ctx.engine.release(result.token);
        }
        let err = NativeError::new(
            NativeStatus::FAILED_PRECONDITION,
            format!(
                "{name} produced {} outputs for a buffer of {output_cap}",
                results.len()
            ),
        );
        return status(ctx, Err(err));
    }

    for (i, result) in results.iter().enumerate() {
        let mut out = TbOutput {
            token: result.token.0,
            dtype: result.dtype.code(),
            rank: result.shape.len() as u32,
            ..TbOutput::default()
        };
        for (dst, &dim) in out.dims.iter_mut().zip(&result.shape) {
            *dst = dim as u64;
        }
        unsafe { *outputs.add(i) = out };
    }
    NativeStatus::OK.0
}

unsafe extern "C" fn tb_release(ctx: *mut c_void, token: u64) {
    let ctx = unsafe { context(ctx) };
    ctx.engine.release(NativeToken(token));
}

unsafe extern "C" fn tb_device_name(
    ctx: *mut c_void,
    token: u64,
    buf: *mut u8,
    cap: usize,
    out_len: *mut usize,
) -> i32 {
    let ctx = unsafe { context(ctx) };
    let result = ctx
        .engine
        .device_name(NativeToken(token))
        .map(|device| unsafe { *out_len = write_truncated(device.as_bytes(), buf, cap) });
    status(ctx, result)
}

unsafe extern "C" fn tb_copy_to_host(ctx: *mut c_void, token: u64, out_token: *mut u64) -> i32 {
    let ctx = unsafe { context(ctx) };
    let result = ctx
        .engine
        .copy_to_host(NativeToken(token))
        .map(|host| unsafe { *out_token = host.0 });
    status(ctx, result)
}

unsafe extern "C" fn tb_last_error(ctx: *mut c_void, buf: *mut u8, cap: usize) -> usize {
    let ctx = unsafe { context(ctx) };
    unsafe { write_truncated(ctx.last_error.as_bytes(), buf, cap) }
}

unsafe extern "C" fn tb_destroy(ctx: *mut c_void) {
    if !ctx.is_null() {
        drop(unsafe { Box::from_raw(ctx.cast::<HostContext>()) });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tensorbridge_core::ffi::TbAttrBuffer;
    use tensorbridge_core::engine::lower_attributes;
    use tensorbridge_core::{AttrValue, DType, OpAttribute};

    unsafe fn last_error(api: &TbNativeApi) -> String {
        unsafe {
            let len = (api.last_error)(api.ctx, std::ptr::null_mut(), 0);
            let mut buf = vec![0u8; len];
            (api.last_error)(api.ctx, buf.as_mut_ptr(), len);
            String::from_utf8(buf).unwrap()
        }
    }

    #[test]
    fn test_round_trip_through_table() {
        let api = HostEngine::new().into_c_api();
        unsafe {
            let dims = [2u64];
            let mut token = 0u64;
            assert_eq!((api.allocate)(api.ctx, dims.as_ptr(), 1, NativeType::FLOAT.code(), &mut token), 0);

            let data: Vec<u8> = bytemuck::cast_slice(&[1.5f32, 2.5]).to_vec();
            assert_eq!((api.bind_bytes)(api.ctx, token, data.as_ptr(), data.len()), 0);

            let attrs = TbAttrBuffer::new(&lower_attributes(&[OpAttribute::dtype("T", DType::Float32)]));
            let name = "Identity";
            let inputs = [token];
            let mut outputs = [TbOutput::default(); 1];
            let mut count = 0usize;
            let code = (api.execute)(
                api.ctx,
                name.as_ptr(),
                name.len(),
                attrs.as_ptr(),
                attrs.len(),
                inputs.as_ptr(),
                1,
                outputs.as_mut_ptr(),
                1,
                &mut count,
            );
            assert_eq!(code, 0);
            assert_eq!(count, 1);
            assert_eq!(outputs[0].rank, 1);
            assert_eq!(outputs[0].dims[0], 2);

            let mut len = 0usize;
            assert_eq!((api.byte_len)(api.ctx, outputs[0].token, &mut len), 0);
            let mut out = vec![0u8; len];
            assert_eq!((api.read_bytes)(api.ctx, outputs[0].token, out.as_mut_ptr(), len), 0);
            assert_eq!(out, data);

            (api.destroy)(api.ctx);
        }
    }

    #[test]
    fn test_errors_are_reported() {
        let api = HostEngine::new().into_c_api();
        unsafe {
            let name = "Nope";
            let mut count = 0usize;
            let code = (api.execute)(
                api.ctx,
                name.as_ptr(),
                name.len(),
                std::ptr::null(),
                0,
                std::ptr::null(),
                0,
                std::ptr::null_mut(),
                0,
                &mut count,
            );
            assert_eq!(code, NativeStatus::NOT_FOUND.0);
            assert!(last_error(&api).contains("'Nope'"));

            (api.destroy)(api.ctx);
        }
    }

    unsafe fn bind_i32(api: &TbNativeApi, values: &[i32]) -> u64 {
        unsafe {
            let dims = [values.len() as u64];
            let mut token = 0u64;
            assert_eq!((api.allocate)(api.ctx, dims.as_ptr(), 1, NativeType::INT32.code(), &mut token), 0);
            let data: &[u8] = bytemuck::cast_slice(values);
            assert_eq!((api.bind_bytes)(api.ctx, token, data.as_ptr(), data.len()), 0);
            token
        }
    }

    unsafe fn run(
        api: &TbNativeApi,
        name: &str,
        attrs: &[OpAttribute],
        inputs: &[u64],
        cap: usize,
    ) -> (i32, usize) {
        let attrs = TbAttrBuffer::new(&lower_attributes(attrs));
        let mut outputs = vec![TbOutput::default(); cap];
        let mut count = 0usize;
        let code = unsafe {
            (api.execute)(
                api.ctx,
                name.as_ptr(),
                name.len(),
                attrs.as_ptr(),
                attrs.len(),
                inputs.as_ptr(),
                inputs.len(),
                outputs.as_mut_ptr(),
                cap,
                &mut count,
            )
        };
        (code, count)
    }

    #[test]
    fn test_small_output_buffer_reports_needed_count() {
        let api = HostEngine::new().into_c_api();
        unsafe {
            let a = bind_i32(&api, &[1]);
            let b = bind_i32(&api, &[2]);
            let attrs = [OpAttribute::new("T", AttrValue::TensorList(vec![DType::Int32, DType::Int32]))];

            let (code, count) = run(&api, "IdentityN", &attrs, &[a, b], 1);
            assert_eq!(code, NativeStatus::FAILED_PRECONDITION.0);
            assert_eq!(count, 2);
            assert_eq!(last_error(&api), "IdentityN produced 2 outputs for a buffer of 1");
            assert_eq!(context(api.ctx).engine.live_tokens().len(), 2);

            (api.destroy)(api.ctx);
        }
    }

    #[test]
    fn test_output_rank_beyond_table_is_released() {
        let api = HostEngine::new().into_c_api();
        unsafe {
            let value = bind_i32(&api, &[7]);
            let shape = bind_i32(&api, &[1; TB_MAX_RANK + 1]);
            let attrs = [
                OpAttribute::dtype("T", DType::Int32),
                OpAttribute::dtype("Tshape", DType::Int32),
            ];

            let (code, count) = run(&api, "Reshape", &attrs, &[value, shape], 4);
            assert_eq!(code, NativeStatus::UNIMPLEMENTED.0);
            assert_eq!(count, 0);
            assert!(last_error(&api).contains("rank 9"));
            assert_eq!(context(api.ctx).engine.live_tokens().len(), 2);

            (api.destroy)(api.ctx);
        }
    }
}
