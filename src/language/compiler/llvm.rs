//! LLVM implementations of the backend builders, enabled by the `llvm`
//! feature.

use super::{backend_error, TypeBuilder};
use crate::language::typecheck::{TypeResult, ValueBuilder};
use inkwell::{
    builder::Builder,
    context::Context,
    types::{AnyTypeEnum, BasicMetadataTypeEnum, BasicType, BasicTypeEnum, FloatType, StructType},
    values::BasicValueEnum,
    AddressSpace,
};

fn basic(ty: AnyTypeEnum<'_>) -> TypeResult<BasicTypeEnum<'_>> {
    BasicTypeEnum::try_from(ty)
        .map_err(|_| backend_error(format!("`{ty:?}` cannot be stored in memory")))
}

fn basics<'ctx>(types: &[AnyTypeEnum<'ctx>]) -> TypeResult<Vec<BasicTypeEnum<'ctx>>> {
    types.iter().map(|ty| basic(*ty)).collect()
}

fn float_of(context: &Context, bits: u32) -> TypeResult<FloatType<'_>> {
    match bits {
        16 => Ok(context.f16_type()),
        32 => Ok(context.f32_type()),
        64 => Ok(context.f64_type()),
        other => Err(backend_error(format!("no {other}-bit float type"))),
    }
}

pub struct LlvmTypeBuilder<'ctx> {
    context: &'ctx Context,
}

impl<'ctx> LlvmTypeBuilder<'ctx> {
    pub fn new(context: &'ctx Context) -> Self {
        Self { context }
    }

    fn named_struct(opaque: &AnyTypeEnum<'ctx>) -> TypeResult<StructType<'ctx>> {
        match opaque {
            AnyTypeEnum::StructType(ty) => Ok(*ty),
            other => Err(backend_error(format!("`{other:?}` is not a named struct"))),
        }
    }
}

#[allow(deprecated)]
impl<'ctx> TypeBuilder for LlvmTypeBuilder<'ctx> {
    type Type = AnyTypeEnum<'ctx>;

    fn int_type(&mut self, bits: u32) -> TypeResult<Self::Type> {
        Ok(self.context.custom_width_int_type(bits).into())
    }

    fn float_type(&mut self, bits: u32) -> TypeResult<Self::Type> {
        Ok(float_of(self.context, bits)?.into())
    }

    fn void_type(&mut self) -> TypeResult<Self::Type> {
        Ok(self.context.void_type().into())
    }

    fn pointer_type(&mut self, pointee: &Self::Type) -> TypeResult<Self::Type> {
        let space = AddressSpace::default();
        let pointer = match pointee {
            AnyTypeEnum::FunctionType(function) => function.ptr_type(space),
            other => basic(*other)?.ptr_type(space),
        };
        Ok(pointer.into())
    }

    fn array_type(&mut self, element: &Self::Type, len: u64) -> TypeResult<Self::Type> {
        let len = u32::try_from(len)
            .map_err(|_| backend_error(format!("array length {len} exceeds u32")))?;
        Ok(basic(*element)?.array_type(len).into())
    }

    fn struct_type(&mut self, fields: &[Self::Type], packed: bool) -> TypeResult<Self::Type> {
        Ok(self.context.struct_type(&basics(fields)?, packed).into())
    }

    fn function_type(&mut self, params: &[Self::Type], ret: &Self::Type) -> TypeResult<Self::Type> {
        let params: Vec<BasicMetadataTypeEnum<'ctx>> =
            basics(params)?.into_iter().map(Into::into).collect();
        let function = match ret {
            AnyTypeEnum::VoidType(void) => void.fn_type(&params, false),
            other => basic(*other)?.fn_type(&params, false),
        };
        Ok(function.into())
    }

    fn opaque_struct(&mut self, name: &str, _packed: bool) -> TypeResult<Self::Type> {
        Ok(self.context.opaque_struct_type(name).into())
    }

    fn set_struct_body(
        &mut self,
        opaque: &Self::Type,
        fields: &[Self::Type],
        packed: bool,
    ) -> TypeResult<()> {
        let named = Self::named_struct(opaque)?;
        if named.set_body(&basics(fields)?, packed) {
            Ok(())
        } else {
            Err(backend_error("struct body was already set"))
        }
    }
}

/// Emits widening conversions as instructions at the builder's position.
pub struct LlvmValueBuilder<'a, 'ctx> {
    context: &'ctx Context,
    builder: &'a Builder<'ctx>,
}

impl<'a, 'ctx> LlvmValueBuilder<'a, 'ctx> {
    pub fn new(context: &'ctx Context, builder: &'a Builder<'ctx>) -> Self {
        Self { context, builder }
    }
}

fn expected(kind: &str, value: &BasicValueEnum<'_>) -> crate::language::typecheck::TypeError {
    backend_error(format!("expected {kind} value, found `{value:?}`"))
}

impl<'ctx> ValueBuilder for LlvmValueBuilder<'_, 'ctx> {
    type Value = BasicValueEnum<'ctx>;

    fn int_cast(&mut self, value: Self::Value, bits: u32, signed: bool) -> TypeResult<Self::Value> {
        let BasicValueEnum::IntValue(int) = value else {
            return Err(expected("an integer", &value));
        };
        let target = self.context.custom_width_int_type(bits);
        self.builder
            .build_int_cast_sign_flag(int, target, signed, "widen")
            .map(Into::into)
            .map_err(|err| backend_error(err.to_string()))
    }

    fn int_to_float(
        &mut self,
        value: Self::Value,
        bits: u32,
        signed: bool,
    ) -> TypeResult<Self::Value> {
        let BasicValueEnum::IntValue(int) = value else {
            return Err(expected("an integer", &value));
        };
        let target = float_of(self.context, bits)?;
        let converted = if signed {
            self.builder.build_signed_int_to_float(int, target, "itof")
        } else {
            self.builder.build_unsigned_int_to_float(int, target, "utof")
        };
        converted
            .map(Into::into)
            .map_err(|err| backend_error(err.to_string()))
    }

    fn float_extend(&mut self, value: Self::Value, bits: u32) -> TypeResult<Self::Value> {
        let BasicValueEnum::FloatValue(float) = value else {
            return Err(expected("a float", &value));
        };
        let target = float_of(self.context, bits)?;
        self.builder
            .build_float_ext(float, target, "fext")
            .map(Into::into)
            .map_err(|err| backend_error(err.to_string()))
    }
}
