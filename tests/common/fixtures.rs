use designmark::{ImageData, ImageFormat, MemoryProvider};
use serde_json::{Value, json};

pub fn bytes(value: Value) -> Vec<u8> {
    serde_json::to_vec(&value).unwrap()
}

/// A full description with the given canvases and keyed components.
pub fn description(name: &str, canvases: Vec<Value>, components: Value) -> Vec<u8> {
    bytes(json!({
        "name": name,
        "document": { "id": "0:0", "type": "DOCUMENT", "children": canvases },
        "components": components
    }))
}

pub fn canvas(id: &str, name: &str, elements: Vec<Value>) -> Value {
    json!({ "id": id, "type": "CANVAS", "name": name, "children": elements })
}

fn bounds(x: f64, y: f64, width: f64, height: f64) -> Value {
    json!({ "x": x, "y": y, "width": width, "height": height })
}

pub fn frame(id: &str, name: &str, children: Vec<Value>) -> Value {
    json!({
        "id": id, "type": "FRAME", "name": name,
        "absoluteBoundingBox": bounds(0.0, 0.0, 360.0, 640.0),
        "fills": [{ "type": "SOLID", "color": { "r": 1.0, "g": 1.0, "b": 1.0 } }],
        "children": children
    })
}

pub fn image_frame(id: &str, name: &str, image_ref: &str) -> Value {
    json!({
        "id": id, "type": "RECTANGLE", "name": name,
        "absoluteBoundingBox": bounds(0.0, 0.0, 360.0, 200.0),
        "fills": [{ "type": "IMAGE", "imageRef": image_ref, "scaleMode": "FILL" }]
    })
}

pub fn instance(id: &str, component_id: &str, name: &str, y: f64) -> Value {
    json!({
        "id": id, "type": "INSTANCE", "name": name, "componentId": component_id,
        "absoluteBoundingBox": bounds(16.0, y, 200.0, 48.0)
    })
}

pub fn component(id: &str, name: &str, children: Vec<Value>) -> Value {
    json!({
        "id": id, "type": "COMPONENT", "name": name,
        "absoluteBoundingBox": bounds(0.0, 0.0, 200.0, 48.0),
        "children": children
    })
}

pub fn text(id: &str, characters: &str, family: &str) -> Value {
    json!({
        "id": id, "type": "TEXT", "name": characters, "characters": characters,
        "absoluteBoundingBox": bounds(8.0, 8.0, 180.0, 24.0),
        "style": { "fontFamily": family, "fontSize": 16, "fontWeight": 400 }
    })
}

pub fn vector(id: &str, name: &str) -> Value {
    json!({
        "id": id, "type": "VECTOR", "name": name,
        "absoluteBoundingBox": bounds(300.0, 16.0, 24.0, 24.0)
    })
}

/// Two canvases, two shared components (one using the other), an external
/// component fetched on demand, two image fills and one vector.
pub fn sample_description() -> Vec<u8> {
    description(
        "Sample",
        vec![
            canvas(
                "1:0",
                "Page 1",
                vec![
                    frame(
                        "1:1",
                        "Home",
                        vec![
                            image_frame("1:2", "Hero", "hero"),
                            instance("1:3", "c:2", "card", 220.0),
                            instance("1:4", "ext:9", "badge", 280.0),
                        ],
                    ),
                    frame("1:5", "About", vec![vector("v:1", "Logo"), text("1:6", "About us", "Ariel")]),
                ],
            ),
            canvas(
                "2:0",
                "Page 2",
                vec![frame("2:1", "Settings", vec![instance("2:2", "c:1", "ok", 16.0)])],
            ),
        ],
        json!({
            "c:1": component("c:1", "primary button", vec![
                image_frame("c:1a", "Background", "btn-bg"),
                text("c:1b", "OK", "Arial"),
            ]),
            "c:2": component("c:2", "card", vec![instance("c:2a", "c:1", "action", 8.0)]),
        }),
    )
}

/// Loads everything [`sample_description`] needs into the backing store.
pub fn sample_provider(provider: &MemoryProvider) {
    provider
        .insert_image("hero", ImageData::new(b"hero-image-bytes".to_vec(), ImageFormat::Png))
        .unwrap();
    provider
        .insert_image("btn-bg", ImageData::new(b"button".to_vec(), ImageFormat::Jpeg))
        .unwrap();
    provider
        .insert_rendering("v:1", ImageData::new(b"logo".to_vec(), ImageFormat::Png))
        .unwrap();
    provider
        .insert_node(
            "ext:9",
            bytes(json!({
                "document": component("ext:9", "badge", vec![text("ext:9a", "New", "Courier New")])
            })),
        )
        .unwrap();
}
