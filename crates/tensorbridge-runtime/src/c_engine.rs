//! [`NativeEngine`] over the C function table.

use std::os::raw::c_void;
use tensorbridge_core::ffi::{TB_MAX_RANK, TbAttrBuffer, TbNativeApi, TbOutput};
use tensorbridge_core::{
    NativeAttr, NativeEngine, NativeError, NativeOutput, NativeStatus, NativeToken, NativeType,
};

/// A native engine reached through a [`TbNativeApi`] table.
///
/// Destroys the native context on drop.
pub struct CEngine {
    api: TbNativeApi,
}

// SAFETY: the table's contract requires the context to be usable from any
// thread as long as calls are not concurrent; `&mut self` on every mutating
// call and the runtime's locking provide that.
unsafe impl Send for CEngine {}

impl CEngine {
    /// Take ownership of a native function table.
    ///
    /// # Safety
    /// Every function pointer must be valid for `api.ctx`, and the context
    /// must not be used or destroyed elsewhere afterwards.
    pub unsafe fn from_api(api: TbNativeApi) -> Self {
        Self { api }
    }

    fn ctx(&self) -> *mut c_void {
        self.api.ctx
    }

    fn last_error(&self) -> String {
        let len = unsafe { (self.api.last_error)(self.ctx(), std::ptr::null_mut(), 0) };
        let mut buf = vec![0u8; len];
        unsafe { (self.api.last_error)(self.ctx(), buf.as_mut_ptr(), buf.len()) };
        String::from_utf8_lossy(&buf).into_owned()
    }

    fn check(&self, status: i32) -> Result<(), NativeError> {
        let status = NativeStatus(status);
        if status.is_ok() {
            Ok(())
        } else {
            Err(NativeError::new(status, self.last_error()))
        }
    }

    fn read_string(
        &self,
        call: impl Fn(*mut u8, usize, *mut usize) -> i32,
    ) -> Result<String, NativeError> {
        let mut len = 0usize;
        self.check(call(std::ptr::null_mut(), 0, &mut len as *mut usize))?;
        let mut buf = vec![0u8; len];
        self.check(call(buf.as_mut_ptr(), buf.len(), &mut len as *mut usize))?;
        buf.truncate(len);
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }
}

impl Drop for CEngine {
    fn drop(&mut self) {
        unsafe { (self.api.destroy)(self.api.ctx) };
    }
}

impl NativeEngine for CEngine {
    fn version(&self) -> String {
        let len = unsafe { (self.api.version)(self.ctx(), std::ptr::null_mut(), 0) };
        let mut buf = vec![0u8; len];
        unsafe { (self.api.version)(self.ctx(), buf.as_mut_ptr(), buf.len()) };
        String::from_utf8_lossy(&buf).into_owned()
    }

    fn allocate(
        &mut self,
        shape: &[usize],
        dtype: NativeType,
    ) -> Result<NativeToken, NativeError> {
        let dims: Vec<u64> = shape.iter().map(|&d| d as u64).collect();
        let mut token = 0u64;
        let status = unsafe {
            (self.api.allocate)(self.ctx(), dims.as_ptr(), dims.len(), dtype.code(), &mut token)
        };
        self.check(status)?;
        Ok(NativeToken(token))
    }

    fn bind_bytes(&mut self, token: NativeToken, bytes: &[u8]) -> Result<(), NativeError> {
        let status =
            unsafe { (self.api.bind_bytes)(self.ctx(), token.0, bytes.as_ptr(), bytes.len()) };
        self.check(status)
    }

    fn read_bytes(&mut self, token: NativeToken) -> Result<Vec<u8>, NativeError> {
        let mut len = 0usize;
        self.check(unsafe { (self.api.byte_len)(self.ctx(), token.0, &mut len) })?;
        let mut buf = vec![0u8; len];
        self.check(unsafe { (self.api.read_bytes)(self.ctx(), token.0, buf.as_mut_ptr(), len) })?;
        Ok(buf)
    }

    fn execute_op(
        &mut self,
        name: &str,
        attrs: &[NativeAttr],
        inputs: &[NativeToken],
    ) -> Result<Vec<NativeOutput>, NativeError> {
        let attrs = TbAttrBuffer::new(attrs);
        let inputs: Vec<u64> = inputs.iter().map(|t| t.0).collect();
        let mut outputs = vec![TbOutput::default(); 4];

        loop {
            let mut count = 0usize;
            let status = unsafe {
                (self.api.execute)(
                    self.ctx(),
                    name.as_ptr(),
                    name.len(),
                    attrs.as_ptr(),
                    attrs.len(),
                    inputs.as_ptr(),
                    inputs.len(),
                    outputs.as_mut_ptr(),
                    outputs.len(),
                    &mut count,
                )
            };
            if NativeStatus(status) == NativeStatus::FAILED_PRECONDITION && count > outputs.len() {
                outputs.resize(count, TbOutput::default());
                continue;
            }
            self.check(status)?;
            outputs.truncate(count);
            break;
        }

        // outputs are all-or-nothing: one unreadable entry releases every token
        if let Some(bad) = outputs.iter().find(|out| out.rank as usize > TB_MAX_RANK) {
            let rank = bad.rank;
            for out in &outputs {
                self.release(NativeToken(out.token));
            }
            return Err(NativeError::new(
                NativeStatus::INTERNAL,
                format!("{name} reported an output of rank {rank}, above the limit of {TB_MAX_RANK}"),
            ));
        }

        Ok(outputs
            .into_iter()
            .map(|out| NativeOutput {
                token: NativeToken(out.token),
                shape: out.dims[..out.rank as usize].iter().map(|&d| d as usize).collect(),
                dtype: NativeType(out.dtype),
            })
            .collect())
    }

    fn release(&mut self, token: NativeToken) {
        unsafe { (self.api.release)(self.ctx(), token.0) };
    }

    fn device_name(&self, token: NativeToken) -> Result<String, NativeError> {
        self.read_string(|buf, cap, len| unsafe {
            (self.api.device_name)(self.ctx(), token.0, buf, cap, len)
        })
    }

    fn copy_to_host(&mut self, token: NativeToken) -> Result<NativeToken, NativeError> {
        let mut host = 0u64;
        self.check(unsafe { (self.api.copy_to_host)(self.ctx(), token.0, &mut host) })?;
        Ok(NativeToken(host))
    }
}
