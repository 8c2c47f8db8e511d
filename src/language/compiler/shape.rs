//! In-memory backend used when no code generator is attached. Mirrors how
//! LLVM treats types: anonymous types are uniqued structurally, named
//! structs are distinct even when their bodies match.

use super::{backend_error, TypeBuilder};
use crate::language::typecheck::TypeResult;
use std::collections::{HashMap, HashSet};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShapeId(usize);

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Shape {
    Int(u32),
    Float(u32),
    Void,
    Pointer(ShapeId),
    Array(ShapeId, u64),
    Struct {
        fields: Vec<ShapeId>,
        packed: bool,
    },
    Function {
        params: Vec<ShapeId>,
        ret: ShapeId,
    },
    Named {
        name: String,
        body: Option<Vec<ShapeId>>,
        packed: bool,
    },
}

#[derive(Debug, Default)]
pub struct ShapeBuilder {
    shapes: Vec<Shape>,
    interned: HashMap<Shape, ShapeId>,
    names: HashSet<String>,
}

impl ShapeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: ShapeId) -> Option<&Shape> {
        self.shapes.get(id.0)
    }

    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }

    fn intern(&mut self, shape: Shape) -> ShapeId {
        if let Some(id) = self.interned.get(&shape) {
            return *id;
        }
        let id = ShapeId(self.shapes.len());
        self.shapes.push(shape.clone());
        self.interned.insert(shape, id);
        id
    }

    fn expect(&self, id: ShapeId) -> TypeResult<&Shape> {
        self.get(id)
            .ok_or_else(|| backend_error(format!("unknown shape #{}", id.0)))
    }

    /// Textual form of a type reference, e.g. `{ i32, %List<i32>* }`.
    pub fn render(&self, id: ShapeId) -> String {
        let Some(shape) = self.get(id) else {
            return format!("<invalid #{}>", id.0);
        };
        match shape {
            Shape::Int(bits) => format!("i{bits}"),
            Shape::Float(16) => "half".to_string(),
            Shape::Float(32) => "float".to_string(),
            Shape::Float(_) => "double".to_string(),
            Shape::Void => "void".to_string(),
            Shape::Pointer(target) => format!("{}*", self.render(*target)),
            Shape::Array(element, len) => format!("[{len} x {}]", self.render(*element)),
            Shape::Struct { fields, packed } => self.render_body(fields, *packed),
            Shape::Function { params, ret } => {
                let params: Vec<String> = params.iter().map(|p| self.render(*p)).collect();
                format!("{} ({})", self.render(*ret), params.join(", "))
            }
            Shape::Named { name, .. } => format!("%\"{name}\""),
        }
    }

    /// Definition line of a named struct, e.g. `%"Pair<i8>" = type { i8 }`.
    pub fn definition(&self, id: ShapeId) -> Option<String> {
        match self.get(id)? {
            Shape::Named { name, body, packed } => Some(match body {
                Some(fields) => format!("%\"{name}\" = type {}", self.render_body(fields, *packed)),
                None => format!("%\"{name}\" = type opaque"),
            }),
            _ => None,
        }
    }

    fn render_body(&self, fields: &[ShapeId], packed: bool) -> String {
        let fields: Vec<String> = fields.iter().map(|f| self.render(*f)).collect();
        let inner = if fields.is_empty() {
            "{}".to_string()
        } else {
            format!("{{ {} }}", fields.join(", "))
        };
        if packed {
            format!("<{inner}>")
        } else {
            inner
        }
    }
}

impl TypeBuilder for ShapeBuilder {
    type Type = ShapeId;

    fn int_type(&mut self, bits: u32) -> TypeResult<ShapeId> {
        if bits == 0 {
            return Err(backend_error("integer types need at least one bit"));
        }
        Ok(self.intern(Shape::Int(bits)))
    }

    fn float_type(&mut self, bits: u32) -> TypeResult<ShapeId> {
        match bits {
            16 | 32 | 64 => Ok(self.intern(Shape::Float(bits))),
            other => Err(backend_error(format!("no {other}-bit float type"))),
        }
    }

    fn void_type(&mut self) -> TypeResult<ShapeId> {
        Ok(self.intern(Shape::Void))
    }

    fn pointer_type(&mut self, pointee: &ShapeId) -> TypeResult<ShapeId> {
        self.expect(*pointee)?;
        Ok(self.intern(Shape::Pointer(*pointee)))
    }

    fn array_type(&mut self, element: &ShapeId, len: u64) -> TypeResult<ShapeId> {
        if matches!(self.expect(*element)?, Shape::Void) {
            return Err(backend_error("array of void"));
        }
        Ok(self.intern(Shape::Array(*element, len)))
    }

    fn struct_type(&mut self, fields: &[ShapeId], packed: bool) -> TypeResult<ShapeId> {
        for field in fields {
            if matches!(self.expect(*field)?, Shape::Void) {
                return Err(backend_error("struct field of type void"));
            }
        }
        Ok(self.intern(Shape::Struct {
            fields: fields.to_vec(),
            packed,
        }))
    }

    fn function_type(&mut self, params: &[ShapeId], ret: &ShapeId) -> TypeResult<ShapeId> {
        self.expect(*ret)?;
        for param in params {
            self.expect(*param)?;
        }
        Ok(self.intern(Shape::Function {
            params: params.to_vec(),
            ret: *ret,
        }))
    }

    fn opaque_struct(&mut self, name: &str, packed: bool) -> TypeResult<ShapeId> {
        let mut unique = name.to_string();
        let mut suffix = 0;
        while self.names.contains(&unique) {
            suffix += 1;
            unique = format!("{name}.{suffix}");
        }
        self.names.insert(unique.clone());
        let id = ShapeId(self.shapes.len());
        self.shapes.push(Shape::Named {
            name: unique,
            body: None,
            packed,
        });
        Ok(id)
    }

    fn set_struct_body(
        &mut self,
        opaque: &ShapeId,
        fields: &[ShapeId],
        packed: bool,
    ) -> TypeResult<()> {
        for field in fields {
            if matches!(self.expect(*field)?, Shape::Void) {
                return Err(backend_error("struct field of type void"));
            }
        }
        match self.shapes.get_mut(opaque.0) {
            Some(Shape::Named {
                body: body @ None,
                packed: is_packed,
                ..
            }) => {
                *body = Some(fields.to_vec());
                *is_packed = packed;
                Ok(())
            }
            Some(Shape::Named { name, .. }) => {
                Err(backend_error(format!("struct `{name}` already has a body")))
            }
            _ => Err(backend_error(format!("shape #{} is not a named struct", opaque.0))),
        }
    }
}
