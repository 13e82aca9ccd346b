//! Embedded Vulkan-GLSL sources for the fixed pass set.
//!
//! Every fragment program is assembled as `FRAGMENT_HEADER` + body. The header
//! declares the shared varyings and the std140 parameter block; each body
//! declares only the texture/sampler pairs it actually samples so the bind
//! group layouts stay minimal. The uniform block layout must match
//! [`PassUniforms`](crate::gpu::programs::PassUniforms) field for field.

/// Full-screen triangle vertex shader.
///
/// Besides `vUv` it emits the four neighbor coordinates used by the
/// stencil-style passes, offset by the target grid's texel size. `vUv` uses
/// the texture convention (v = 0 at the top row): NDC y = +1 is the top of
/// the framebuffer, so v must decrease as `pos.y` grows or every pass would
/// read the vertical mirror of what the previous pass wrote.
pub(crate) const VERTEX_SHADER: &str = r"#version 450
layout(location = 0) out vec2 vUv;
layout(location = 1) out vec2 vL;
layout(location = 2) out vec2 vR;
layout(location = 3) out vec2 vT;
layout(location = 4) out vec2 vB;

layout(std140, set = 0, binding = 0) uniform PassParams {
    vec4 _texel;
    vec4 _source_texel;
    vec4 _color;
    vec4 _point;
    vec4 _scalars;
} ubo;

const vec2 positions[3] = vec2[3](
    vec2(-1.0, -3.0),
    vec2(3.0, 1.0),
    vec2(-1.0, 1.0)
);

void main() {
    vec2 pos = positions[uint(gl_VertexIndex)];
    vUv = vec2(pos.x * 0.5 + 0.5, 0.5 - pos.y * 0.5);
    vL = vUv - vec2(ubo._texel.x, 0.0);
    vR = vUv + vec2(ubo._texel.x, 0.0);
    vT = vUv + vec2(0.0, ubo._texel.y);
    vB = vUv - vec2(0.0, ubo._texel.y);
    gl_Position = vec4(pos, 0.0, 1.0);
}
";

/// Shared fragment prologue: varyings, output, parameter block, field macros.
pub(crate) const FRAGMENT_HEADER: &str = r"#version 450
layout(location = 0) in vec2 vUv;
layout(location = 1) in vec2 vL;
layout(location = 2) in vec2 vR;
layout(location = 3) in vec2 vT;
layout(location = 4) in vec2 vB;
layout(location = 0) out vec4 outColor;

layout(std140, set = 0, binding = 0) uniform PassParams {
    vec4 _texel;
    vec4 _source_texel;
    vec4 _color;
    vec4 _point;
    vec4 _scalars;
} ubo;

#define texelSize ubo._texel.xy
#define velocityTexelSize ubo._texel.zw
#define sourceTexelSize ubo._source_texel.xy
#define splatColor ubo._color.rgb
#define clearScale ubo._color.x
#define splatPoint ubo._point.xy
#define splatRadius ubo._point.z
#define aspectRatio ubo._point.w
#define deltaTime ubo._scalars.x
#define dissipation ubo._scalars.y
#define curlStrength ubo._scalars.z
";

/// Blit of the bound texture, used by the pool's content-preserving resize.
pub(crate) const COPY_SHADER: &str = r"
layout(set = 1, binding = 0) uniform texture2D uTexture_t;
layout(set = 1, binding = 1) uniform sampler uTexture_s;
#define uTexture sampler2D(uTexture_t, uTexture_s)

void main() {
    outColor = texture(uTexture, vUv);
}
";

/// Scales the previous field by `clearScale`; damps pressure between solves.
pub(crate) const CLEAR_SHADER: &str = r"
layout(set = 1, binding = 0) uniform texture2D uTexture_t;
layout(set = 1, binding = 1) uniform sampler uTexture_s;
#define uTexture sampler2D(uTexture_t, uTexture_s)

void main() {
    outColor = clearScale * texture(uTexture, vUv);
}
";

/// Additive Gaussian injection centered on `splatPoint`.
pub(crate) const SPLAT_SHADER: &str = r"
layout(set = 1, binding = 0) uniform texture2D uTarget_t;
layout(set = 1, binding = 1) uniform sampler uTarget_s;
#define uTarget sampler2D(uTarget_t, uTarget_s)

void main() {
    vec2 p = vUv - splatPoint;
    p.x *= aspectRatio;
    vec3 splat = exp(-dot(p, p) / splatRadius) * splatColor;
    vec3 base = texture(uTarget, vUv).xyz;
    outColor = vec4(base + splat, 1.0);
}
";

/// Scalar vorticity from velocity neighbor differences.
pub(crate) const CURL_SHADER: &str = r"
layout(set = 1, binding = 0) uniform texture2D uVelocity_t;
layout(set = 1, binding = 1) uniform sampler uVelocity_s;
#define uVelocity sampler2D(uVelocity_t, uVelocity_s)

void main() {
    float L = texture(uVelocity, vL).y;
    float R = texture(uVelocity, vR).y;
    float T = texture(uVelocity, vT).x;
    float B = texture(uVelocity, vB).x;
    float vorticity = R - L - T + B;
    outColor = vec4(0.5 * vorticity, 0.0, 0.0, 1.0);
}
";

/// Vorticity confinement force, clamped to keep velocity bounded.
pub(crate) const VORTICITY_SHADER: &str = r"
layout(set = 1, binding = 0) uniform texture2D uVelocity_t;
layout(set = 1, binding = 1) uniform sampler uVelocity_s;
layout(set = 1, binding = 2) uniform texture2D uCurl_t;
layout(set = 1, binding = 3) uniform sampler uCurl_s;
#define uVelocity sampler2D(uVelocity_t, uVelocity_s)
#define uCurl sampler2D(uCurl_t, uCurl_s)

void main() {
    float L = texture(uCurl, vL).x;
    float R = texture(uCurl, vR).x;
    float T = texture(uCurl, vT).x;
    float B = texture(uCurl, vB).x;
    float C = texture(uCurl, vUv).x;

    vec2 force = 0.5 * vec2(abs(T) - abs(B), abs(R) - abs(L));
    force /= length(force) + 0.0001;
    force *= curlStrength * C;
    force.y *= -1.0;

    vec2 velocity = texture(uVelocity, vUv).xy;
    velocity += force * deltaTime;
    velocity = clamp(velocity, vec2(-1000.0), vec2(1000.0));
    outColor = vec4(velocity, 0.0, 1.0);
}
";

/// Velocity divergence with free-slip boundaries: an out-of-range neighbor is
/// replaced by the negated own-axis component of the center sample.
pub(crate) const DIVERGENCE_SHADER: &str = r"
layout(set = 1, binding = 0) uniform texture2D uVelocity_t;
layout(set = 1, binding = 1) uniform sampler uVelocity_s;
#define uVelocity sampler2D(uVelocity_t, uVelocity_s)

void main() {
    float L = texture(uVelocity, vL).x;
    float R = texture(uVelocity, vR).x;
    float T = texture(uVelocity, vT).y;
    float B = texture(uVelocity, vB).y;

    vec2 C = texture(uVelocity, vUv).xy;
    if (vL.x < 0.0) { L = -C.x; }
    if (vR.x > 1.0) { R = -C.x; }
    if (vT.y > 1.0) { T = -C.y; }
    if (vB.y < 0.0) { B = -C.y; }

    float div = 0.5 * (R - L + T - B);
    outColor = vec4(div, 0.0, 0.0, 1.0);
}
";

/// One Jacobi iteration of the pressure Poisson solve.
pub(crate) const PRESSURE_SHADER: &str = r"
layout(set = 1, binding = 0) uniform texture2D uPressure_t;
layout(set = 1, binding = 1) uniform sampler uPressure_s;
layout(set = 1, binding = 2) uniform texture2D uDivergence_t;
layout(set = 1, binding = 3) uniform sampler uDivergence_s;
#define uPressure sampler2D(uPressure_t, uPressure_s)
#define uDivergence sampler2D(uDivergence_t, uDivergence_s)

void main() {
    float L = texture(uPressure, vL).x;
    float R = texture(uPressure, vR).x;
    float T = texture(uPressure, vT).x;
    float B = texture(uPressure, vB).x;
    float divergence = texture(uDivergence, vUv).x;
    float pressure = (L + R + B + T - divergence) * 0.25;
    outColor = vec4(pressure, 0.0, 0.0, 1.0);
}
";

/// Subtracts the pressure gradient from velocity (projection step).
pub(crate) const GRADIENT_SUBTRACT_SHADER: &str = r"
layout(set = 1, binding = 0) uniform texture2D uPressure_t;
layout(set = 1, binding = 1) uniform sampler uPressure_s;
layout(set = 1, binding = 2) uniform texture2D uVelocity_t;
layout(set = 1, binding = 3) uniform sampler uVelocity_s;
#define uPressure sampler2D(uPressure_t, uPressure_s)
#define uVelocity sampler2D(uVelocity_t, uVelocity_s)

void main() {
    float L = texture(uPressure, vL).x;
    float R = texture(uPressure, vR).x;
    float T = texture(uPressure, vT).x;
    float B = texture(uPressure, vB).x;
    vec2 velocity = texture(uVelocity, vUv).xy;
    velocity -= vec2(R - L, T - B);
    outColor = vec4(velocity, 0.0, 1.0);
}
";

/// Semi-Lagrangian advection. `MANUAL_FILTERING` swaps hardware bilinear
/// sampling for an explicit 4-tap reconstruction on devices that cannot
/// filter float textures.
pub(crate) const ADVECTION_SHADER: &str = r"
layout(set = 1, binding = 0) uniform texture2D uVelocity_t;
layout(set = 1, binding = 1) uniform sampler uVelocity_s;
layout(set = 1, binding = 2) uniform texture2D uSource_t;
layout(set = 1, binding = 3) uniform sampler uSource_s;
#define uVelocity sampler2D(uVelocity_t, uVelocity_s)
#define uSource sampler2D(uSource_t, uSource_s)

#ifdef MANUAL_FILTERING
vec4 bilerpVelocity(vec2 uv) {
    vec2 st = uv / velocityTexelSize - 0.5;
    vec2 iuv = floor(st);
    vec2 fuv = fract(st);
    vec4 a = texture(uVelocity, (iuv + vec2(0.5, 0.5)) * velocityTexelSize);
    vec4 b = texture(uVelocity, (iuv + vec2(1.5, 0.5)) * velocityTexelSize);
    vec4 c = texture(uVelocity, (iuv + vec2(0.5, 1.5)) * velocityTexelSize);
    vec4 d = texture(uVelocity, (iuv + vec2(1.5, 1.5)) * velocityTexelSize);
    return mix(mix(a, b, fuv.x), mix(c, d, fuv.x), fuv.y);
}

vec4 bilerpSource(vec2 uv) {
    vec2 st = uv / sourceTexelSize - 0.5;
    vec2 iuv = floor(st);
    vec2 fuv = fract(st);
    vec4 a = texture(uSource, (iuv + vec2(0.5, 0.5)) * sourceTexelSize);
    vec4 b = texture(uSource, (iuv + vec2(1.5, 0.5)) * sourceTexelSize);
    vec4 c = texture(uSource, (iuv + vec2(0.5, 1.5)) * sourceTexelSize);
    vec4 d = texture(uSource, (iuv + vec2(1.5, 1.5)) * sourceTexelSize);
    return mix(mix(a, b, fuv.x), mix(c, d, fuv.x), fuv.y);
}
#endif

void main() {
#ifdef MANUAL_FILTERING
    vec2 coord = vUv - deltaTime * bilerpVelocity(vUv).xy * velocityTexelSize;
    vec4 result = bilerpSource(coord);
#else
    vec2 coord = vUv - deltaTime * texture(uVelocity, vUv).xy * velocityTexelSize;
    vec4 result = texture(uSource, coord);
#endif
    float decay = 1.0 + dissipation * deltaTime;
    outColor = result / decay;
}
";

/// Final composite of the dye field. The `SHADING` variant adds a cheap
/// normal-based diffuse term built from neighboring dye intensities.
pub(crate) const DISPLAY_SHADER: &str = r"
layout(set = 1, binding = 0) uniform texture2D uTexture_t;
layout(set = 1, binding = 1) uniform sampler uTexture_s;
#define uTexture sampler2D(uTexture_t, uTexture_s)

void main() {
    vec3 c = texture(uTexture, vUv).rgb;
#ifdef SHADING
    vec3 lc = texture(uTexture, vL).rgb;
    vec3 rc = texture(uTexture, vR).rgb;
    vec3 tc = texture(uTexture, vT).rgb;
    vec3 bc = texture(uTexture, vB).rgb;

    float dx = length(rc) - length(lc);
    float dy = length(tc) - length(bc);

    vec3 n = normalize(vec3(dx, dy, length(texelSize)));
    vec3 l = vec3(0.0, 0.0, 1.0);
    float diffuse = clamp(dot(n, l) + 0.7, 0.7, 1.0);
    c *= diffuse;
#endif
    float a = max(c.r, max(c.g, c.b));
    outColor = vec4(c, a);
}
";
