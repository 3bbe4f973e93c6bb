use super::{HostValue, attr_type_list, expect_dtype, expect_inputs};
use tensorbridge_core::{NativeAttr, NativeError};

pub(super) fn identity(
    attrs: &[NativeAttr],
    inputs: &[&HostValue],
) -> Result<Vec<HostValue>, NativeError> {
    expect_inputs("Identity", inputs, 1)?;
    expect_dtype(attrs, "T", inputs[0])?;
    Ok(vec![inputs[0].clone()])
}

pub(super) fn identity_n(
    attrs: &[NativeAttr],
    inputs: &[&HostValue],
) -> Result<Vec<HostValue>, NativeError> {
    let declared = attr_type_list(attrs, "T")?;
    let actual: Vec<_> = inputs.iter().map(|v| v.dtype).collect();
    if declared != actual {
        return Err(NativeError::invalid_argument(format!(
            "IdentityN declared {declared:?}, got inputs of {actual:?}"
        )));
    }
    Ok(inputs.iter().map(|&v| v.clone()).collect())
}
